//! Renderer selection and connection settings.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pillar_ci_core::{PillarRenderer, DEFAULT_RENDER_TIMEOUT};
use thiserror::Error;

use crate::fixtures::FixtureRenderer;
use crate::salt_api::SaltApiRenderer;
use crate::salt_run::{SaltRunRenderer, DEFAULT_SALT_RUN};

/// Errors raised while assembling a renderer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("unknown renderer backend '{0}' (expected salt-run, salt-api or fixtures)")]
    UnknownBackend(String),

    #[error("http client: {0}")]
    Http(String),
}

/// salt-api connection details.
#[derive(Clone)]
pub struct SaltApiConfig {
    /// Base URL, e.g. `https://salt.example.com:8000`
    pub url: String,
    pub username: String,
    pub password: String,
    /// External auth backend (default: "pam")
    pub eauth: String,
}

impl SaltApiConfig {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        eauth: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            eauth: eauth.into(),
        }
    }
}

impl fmt::Debug for SaltApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaltApiConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("eauth", &self.eauth)
            .finish()
    }
}

/// Where pillar comes from.
#[derive(Debug, Clone)]
pub enum Backend {
    /// `salt-run` on the local master
    SaltRun {
        binary: PathBuf,
        config_dir: Option<PathBuf>,
    },
    /// salt-api over HTTP
    SaltApi(SaltApiConfig),
    /// Pre-rendered `<root>/<environment>/<node>.json` files
    Fixtures { root: PathBuf },
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::SaltRun { .. } => "salt-run",
            Backend::SaltApi(_) => "salt-api",
            Backend::Fixtures { .. } => "fixtures",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub backend: Backend,
    /// Per-render timeout applied inside the backend
    pub timeout: Duration,
}

impl RendererConfig {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - PILLAR_CI_RENDERER (optional, default: "salt-run")
    /// - SALT_RUN_BIN (optional, default: "salt-run")
    /// - SALT_CONFIG_DIR (optional)
    /// - SALT_API_URL, SALT_API_USER, SALT_API_PASSWORD (required for salt-api)
    /// - SALT_API_EAUTH (optional, default: "pam")
    /// - PILLAR_CI_FIXTURES (required for fixtures)
    /// - PILLAR_CI_TIMEOUT_SECS (optional, default: 120)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let backend = match var("PILLAR_CI_RENDERER").as_deref().unwrap_or("salt-run") {
            "salt-run" => Backend::SaltRun {
                binary: var("SALT_RUN_BIN")
                    .unwrap_or_else(|| DEFAULT_SALT_RUN.to_string())
                    .into(),
                config_dir: var("SALT_CONFIG_DIR").map(PathBuf::from),
            },
            "salt-api" => Backend::SaltApi(SaltApiConfig::new(
                required("SALT_API_URL")?,
                required("SALT_API_USER")?,
                required("SALT_API_PASSWORD")?,
                var("SALT_API_EAUTH").unwrap_or_else(|| "pam".to_string()),
            )),
            "fixtures" => Backend::Fixtures {
                root: required("PILLAR_CI_FIXTURES")?.into(),
            },
            other => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let timeout = match var("PILLAR_CI_TIMEOUT_SECS") {
            Some(raw) => parse_timeout_secs(&raw).ok_or(ConfigError::Invalid {
                name: "PILLAR_CI_TIMEOUT_SECS",
                value: raw,
            })?,
            None => DEFAULT_RENDER_TIMEOUT,
        };

        Ok(Self { backend, timeout })
    }

    /// Build the renderer this configuration describes.
    pub fn build(&self) -> Result<Arc<dyn PillarRenderer>, ConfigError> {
        build_renderer(self)
    }
}

fn parse_timeout_secs(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
    }
}

pub fn build_renderer(config: &RendererConfig) -> Result<Arc<dyn PillarRenderer>, ConfigError> {
    let renderer: Arc<dyn PillarRenderer> = match &config.backend {
        Backend::SaltRun { binary, config_dir } => {
            let renderer = SaltRunRenderer::new(binary, config.timeout);
            Arc::new(match config_dir {
                Some(dir) => renderer.with_config_dir(dir),
                None => renderer,
            })
        }
        Backend::SaltApi(api) => Arc::new(SaltApiRenderer::new(api.clone(), config.timeout)?),
        Backend::Fixtures { root } => Arc::new(FixtureRenderer::new(root)),
    };
    Ok(renderer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_to_salt_run() {
        let config = RendererConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend.name(), "salt-run");
        assert_eq!(config.timeout, DEFAULT_RENDER_TIMEOUT);
        match config.backend {
            Backend::SaltRun { binary, config_dir } => {
                assert_eq!(binary, PathBuf::from("salt-run"));
                assert!(config_dir.is_none());
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_salt_api_requires_credentials() {
        let err = RendererConfig::from_lookup(lookup(&[
            ("PILLAR_CI_RENDERER", "salt-api"),
            ("SALT_API_URL", "https://salt:8000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SALT_API_USER")));
    }

    #[test]
    fn test_salt_api_from_env() {
        let config = RendererConfig::from_lookup(lookup(&[
            ("PILLAR_CI_RENDERER", "salt-api"),
            ("SALT_API_URL", "https://salt:8000"),
            ("SALT_API_USER", "ci"),
            ("SALT_API_PASSWORD", "hunter2"),
            ("PILLAR_CI_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        match &config.backend {
            Backend::SaltApi(api) => {
                assert_eq!(api.eauth, "pam");
                let debug = format!("{api:?}");
                assert!(!debug.contains("hunter2"));
                assert!(debug.contains("<redacted>"));
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_invalid_timeout_and_backend() {
        let err = RendererConfig::from_lookup(lookup(&[("PILLAR_CI_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = RendererConfig::from_lookup(lookup(&[("PILLAR_CI_RENDERER", "puppet")]))
            .unwrap_err();
        assert!(err.to_string().contains("puppet"));
    }

    #[test]
    fn test_build_fixtures_renderer() {
        let config = RendererConfig::new(Backend::Fixtures {
            root: PathBuf::from("/tmp/pillar"),
        });
        let renderer = config.build().unwrap();
        assert_eq!(renderer.name(), "fixtures");
    }
}
