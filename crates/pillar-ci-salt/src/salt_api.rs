//! Renderer that calls the pillar runner through salt-api (rest_cherrypy).

use std::time::Duration;

use async_trait::async_trait;
use pillar_ci_core::{ConfigTree, PillarRenderer, RenderError, RenderResult};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{ConfigError, SaltApiConfig};
use crate::pillar::pillar_from_value;

/// Posts `pillar.show_pillar` runner calls to `<url>/run`.
pub struct SaltApiRenderer {
    config: SaltApiConfig,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl SaltApiRenderer {
    pub fn new(config: SaltApiConfig, timeout: Duration) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("pillar-ci/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Http(e.to_string()))?;

        Ok(Self {
            config,
            timeout,
            http_client,
        })
    }

    fn run_url(&self) -> String {
        format!("{}/run", self.config.url.trim_end_matches('/'))
    }

    /// Lowstate body for one render.
    pub fn request_body(&self, node: &str, environment: &str) -> Value {
        json!([{
            "client": "runner",
            "fun": "pillar.show_pillar",
            "kwarg": {
                "minion": node,
                "pillarenv": environment,
            },
            "username": self.config.username,
            "password": self.config.password,
            "eauth": self.config.eauth,
        }])
    }
}

/// Pull the pillar out of a `{"return": [ {...} ]}` response.
pub fn extract_return(node: &str, environment: &str, body: Value) -> RenderResult<ConfigTree> {
    let first = match body {
        Value::Object(mut map) => match map.remove("return") {
            Some(Value::Array(items)) => items.into_iter().next(),
            _ => None,
        },
        _ => None,
    };

    match first {
        Some(pillar) => pillar_from_value(node, environment, pillar),
        None => Err(RenderError::malformed(
            node,
            environment,
            "response has no 'return' entry",
        )),
    }
}

#[async_trait]
impl PillarRenderer for SaltApiRenderer {
    async fn render(&self, node: &str, environment: &str) -> RenderResult<ConfigTree> {
        let response = self
            .http_client
            .post(self.run_url())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&self.request_body(node, environment))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RenderError::Timeout {
                        node: node.to_string(),
                        environment: environment.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    RenderError::Unreachable {
                        node: node.to_string(),
                        environment: environment.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        debug!(node = %node, environment = %environment, status = %status, "salt-api responded");

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RenderError::failed(
                node,
                environment,
                "salt-api rejected the credentials",
            ));
        }
        if !status.is_success() {
            return Err(RenderError::failed(
                node,
                environment,
                format!("salt-api returned HTTP {status}"),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RenderError::malformed(node, environment, e.to_string()))?;
        extract_return(node, environment, body)
    }

    fn name(&self) -> &str {
        "salt-api"
    }
}
