//! AIOps RCA binary
//!
//! Replays a recorded incident through the collaborator pipeline:
//! - `analyze`: load a JSON incident fixture and print the diagnostic report
//! - `config`: print the effective configuration (defaults + `AIOPS_*` env)

use aiops_agents::Collaborator;
use aiops_core::chat::{ChatCompletions, NoopChat, StaticChat};
use aiops_core::config::RcaConfig;
use aiops_sources::IncidentFixture;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// AIOps CLI arguments
#[derive(Debug, Parser)]
#[clap(name = "aiops", version, about = "Multi-agent root-cause analysis")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[clap(long, env = "AIOPS_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[clap(long, env = "AIOPS_LOG_JSON", global = true)]
    log_json: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the RCA pipeline over an incident fixture
    Analyze {
        /// Incident fixture path (JSON)
        #[clap(long)]
        fixture: PathBuf,

        /// Static chat reply; without it every advisory step uses its fallback
        #[clap(long)]
        reply: Option<String>,

        /// Override the tenant id
        #[clap(long, env = "AIOPS_TENANT_ID")]
        tenant: Option<String>,

        /// Print collaborator statistics to stderr after the report
        #[clap(long)]
        stats: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    info!("Starting aiops v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Analyze {
            fixture,
            reply,
            tenant,
            stats,
        } => run_analyze(fixture, reply, tenant, stats).await,
        Commands::Config => {
            let config = RcaConfig::from_env();
            config.validate().context("Invalid configuration")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Run the analyze subcommand
async fn run_analyze(
    path: PathBuf,
    reply: Option<String>,
    tenant: Option<String>,
    print_stats: bool,
) -> Result<()> {
    let mut config = RcaConfig::from_env();
    if tenant.is_some() {
        config.tenant_id = tenant;
    }

    let fixture = IncidentFixture::load(&path)
        .with_context(|| format!("Failed to load fixture {}", path.display()))?;

    info!(
        fixture = %path.display(),
        services = fixture.services.len(),
        alerts = fixture.alerts.len(),
        metrics = fixture.metrics.len(),
        logs = fixture.logs.len(),
        "Fixture loaded"
    );

    let chat: Arc<dyn ChatCompletions> = match reply {
        Some(reply) => Arc::new(StaticChat::new(reply)),
        None => Arc::new(NoopChat::new()),
    };

    let collaborator = Collaborator::with_sources(
        config,
        chat,
        Arc::new(fixture.metrics_source()),
        Arc::new(fixture.logs_source()),
        Arc::new(fixture.topology_source()),
    )
    .context("Failed to create collaborator")?;

    let report = collaborator
        .collaborate(
            &fixture.query,
            fixture.time_range,
            fixture.services.clone(),
            fixture.alerts.clone(),
        )
        .await
        .context("Collaboration failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if print_stats {
        let stats = collaborator.stats().await;
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(())
}

/// Initialize logging; logs go to stderr so stdout stays valid JSON
fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .context("Invalid log level")?;

    if cli.log_json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_current_span(true),
            )
            .with(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(log_level.into()),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true),
            )
            .with(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(log_level.into()),
            )
            .init();
    }

    Ok(())
}
