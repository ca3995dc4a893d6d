//! pillar-ci - pillar diff gate for salt change requests
//!
//! ## Commands
//!
//! - `validate`: render nodes in two pillar environments and diff them
//! - `diff`: compare two snapshot files offline
//! - `render`: print one node's compiled pillar

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pillar_ci_core::obs::ValidationSpan;
use pillar_ci_core::{
    AggregatorOptions, ChangeGate, DiffOptions, EnvironmentAggregator, EnvironmentSnapshot,
    GatePolicy, MismatchPolicy, TreeDiffer, ValidationReport, ValidationRequest,
    DEFAULT_CONCURRENCY,
};
use pillar_ci_salt::{Backend, RendererConfig, SaltApiConfig, DEFAULT_SALT_RUN};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "pillar-ci")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Diff compiled salt pillar between two environments", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render nodes in the target and incoming environments and diff them
    Validate {
        /// Comma-separated node ids
        #[arg(long, value_delimiter = ',', required = true)]
        nodes: Vec<String>,

        /// Environment holding the currently deployed pillar
        #[arg(long, default_value = "base")]
        target: String,

        /// Environment holding the proposed change
        #[arg(long)]
        incoming: String,

        #[command(flatten)]
        renderer: RendererArgs,

        /// Concurrent renders per environment
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// How to report a key that is a mapping on one side and a value on the other
        #[arg(long, value_enum, default_value_t = OnMismatch::Error)]
        on_mismatch: OnMismatch,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Regex over `path;kind` lines that are expected (repeatable)
        #[arg(long)]
        allow: Vec<String>,

        /// Exit with status 1 when unexpected changes are found
        #[arg(long)]
        fail_on_changes: bool,
    },

    /// Compare two snapshot files (`{"<node>": {...}}`) without a salt master
    Diff {
        target: PathBuf,
        incoming: PathBuf,

        #[arg(long, value_enum, default_value_t = OnMismatch::Error)]
        on_mismatch: OnMismatch,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print one node's rendered pillar as JSON
    Render {
        #[arg(long)]
        node: String,

        #[arg(long)]
        env: String,

        #[command(flatten)]
        renderer: RendererArgs,
    },
}

#[derive(clap::Args, Debug, Clone)]
struct RendererArgs {
    /// Backend used to compile pillar
    #[arg(long, value_enum, env = "PILLAR_CI_RENDERER", default_value_t = RendererKind::SaltRun)]
    renderer: RendererKind,

    /// salt-run executable
    #[arg(long, env = "SALT_RUN_BIN", default_value = DEFAULT_SALT_RUN)]
    salt_run_bin: PathBuf,

    /// Salt master configuration directory
    #[arg(long, env = "SALT_CONFIG_DIR")]
    salt_config_dir: Option<PathBuf>,

    #[arg(long, env = "SALT_API_URL")]
    salt_api_url: Option<String>,

    #[arg(long, env = "SALT_API_USER")]
    salt_api_user: Option<String>,

    #[arg(long, env = "SALT_API_PASSWORD", hide_env_values = true)]
    salt_api_password: Option<String>,

    #[arg(long, env = "SALT_API_EAUTH", default_value = "pam")]
    salt_api_eauth: String,

    /// Root of `<env>/<node>.json` fixture files
    #[arg(long, env = "PILLAR_CI_FIXTURES")]
    fixtures: Option<PathBuf>,

    /// Per-render timeout in seconds
    #[arg(long, env = "PILLAR_CI_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum RendererKind {
    SaltRun,
    SaltApi,
    Fixtures,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OnMismatch {
    Error,
    Modified,
}

impl From<OnMismatch> for MismatchPolicy {
    fn from(value: OnMismatch) -> Self {
        match value {
            OnMismatch::Error => MismatchPolicy::Error,
            OnMismatch::Modified => MismatchPolicy::Modified,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

impl RendererArgs {
    fn timeout(&self) -> Result<Duration> {
        if self.timeout_secs == 0 {
            anyhow::bail!("--timeout-secs must be greater than zero");
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }

    fn to_config(&self) -> Result<RendererConfig> {
        let backend = match self.renderer {
            RendererKind::SaltRun => Backend::SaltRun {
                binary: self.salt_run_bin.clone(),
                config_dir: self.salt_config_dir.clone(),
            },
            RendererKind::SaltApi => Backend::SaltApi(SaltApiConfig::new(
                self.salt_api_url
                    .clone()
                    .context("--salt-api-url (SALT_API_URL) is required for salt-api")?,
                self.salt_api_user
                    .clone()
                    .context("--salt-api-user (SALT_API_USER) is required for salt-api")?,
                self.salt_api_password
                    .clone()
                    .context("--salt-api-password (SALT_API_PASSWORD) is required for salt-api")?,
                self.salt_api_eauth.clone(),
            )),
            RendererKind::Fixtures => Backend::Fixtures {
                root: self
                    .fixtures
                    .clone()
                    .context("--fixtures (PILLAR_CI_FIXTURES) is required for fixtures")?,
            },
        };
        Ok(RendererConfig::new(backend).with_timeout(self.timeout()?))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    pillar_ci_core::init_tracing(cli.json_logs, level);

    match cli.command {
        Commands::Validate {
            nodes,
            target,
            incoming,
            renderer,
            concurrency,
            on_mismatch,
            format,
            allow,
            fail_on_changes,
        } => {
            let request = ValidationRequest::new(nodes, target, incoming)?;
            let options = AggregatorOptions::default()
                .with_concurrency(concurrency)
                .with_render_timeout(Some(renderer.timeout()?))
                .with_diff(DiffOptions::default().with_mismatch(on_mismatch.into()));
            let passed = cmd_validate(&request, &renderer, options, format, &allow, fail_on_changes)
                .await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Diff {
            target,
            incoming,
            on_mismatch,
            format,
        } => cmd_diff(&target, &incoming, on_mismatch, format),
        Commands::Render { node, env, renderer } => cmd_render(&node, &env, &renderer).await,
    }
}

/// Returns whether the gate passed (always true without `--fail-on-changes`).
async fn cmd_validate(
    request: &ValidationRequest,
    renderer_args: &RendererArgs,
    options: AggregatorOptions,
    format: OutputFormat,
    allow: &[String],
    fail_on_changes: bool,
) -> Result<bool> {
    let renderer = renderer_args
        .to_config()?
        .build()
        .context("Failed to build pillar renderer")?;
    let aggregator = EnvironmentAggregator::new(renderer, options);

    let report = aggregator
        .validate_report(request)
        .await
        .context("Pillar validation failed")?;
    print!("{}", format_report(&report, format)?);

    if !fail_on_changes {
        return Ok(true);
    }
    let policy = GatePolicy::default()
        .with_allow_patterns(allow)
        .context("Invalid --allow pattern")?;
    let verdict = ChangeGate::evaluate(&report.changes, &policy);
    eprintln!("{}", verdict.message);
    Ok(verdict.passed)
}

fn cmd_diff(
    target_path: &Path,
    incoming_path: &Path,
    on_mismatch: OnMismatch,
    format: OutputFormat,
) -> Result<()> {
    let target = EnvironmentSnapshot::load(target_path)
        .with_context(|| format!("Failed to load {}", target_path.display()))?;
    let incoming = EnvironmentSnapshot::load(incoming_path)
        .with_context(|| format!("Failed to load {}", incoming_path.display()))?;

    let differ = TreeDiffer::new(DiffOptions::default().with_mismatch(on_mismatch.into()));
    let report = ValidationReport::compare(&target, &incoming, &differ)?;
    let _span = ValidationSpan::enter(
        &report.run_id.to_string(),
        &report.target_environment,
        &report.incoming_environment,
    );
    info!(
        changes = report.changes.len(),
        nodes_added = report.node_delta.added.len(),
        nodes_removed = report.node_delta.removed.len(),
        "snapshots compared"
    );

    print!("{}", format_report(&report, format)?);
    Ok(())
}

async fn cmd_render(node: &str, environment: &str, renderer_args: &RendererArgs) -> Result<()> {
    let renderer = renderer_args
        .to_config()?
        .build()
        .context("Failed to build pillar renderer")?;
    let tree = renderer
        .render(node, environment)
        .await
        .with_context(|| format!("Failed to render {node} in {environment}"))?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

fn format_report(report: &ValidationReport, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => report.render_text(),
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&report.flat_changes())?),
        OutputFormat::Markdown => report.render_markdown(),
    })
}
