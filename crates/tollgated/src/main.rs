//! tollgated — the Tollgate daemon.
//!
//! Assembles the engine from `tollgate.toml` plus environment overrides:
//! - Session store (redb), when a path is configured
//! - HTTP inference client
//! - Engine (admission, safety gate, metrics, evaluation)
//! - REST API
//!
//! # Usage
//!
//! ```text
//! tollgated serve --config /etc/tollgate/tollgate.toml --bind 0.0.0.0:8080
//! tollgated eval --config /etc/tollgate/tollgate.toml --cases security-override,scope-poem
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tollgate_core::TollgateConfig;
use tollgate_engine::{Engine, SessionPersistence};
use tollgate_eval::{EvalAccess, EvalSelection};
use tollgate_state::SessionStore;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tollgated=debug,tollgate=debug";

#[derive(Parser)]
#[command(name = "tollgated", about = "Tollgate daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Path to tollgate.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Listen address, overriding `[server] bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run the evaluation suite once and print the JSON report.
    Eval {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Comma-separated case ids. All cases when omitted.
        #[arg(long, value_delimiter = ',')]
        cases: Vec<String>,

        /// Maximum number of cases to run.
        #[arg(long)]
        max: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve { config, bind } => serve(config.as_deref(), bind).await,
        Command::Eval { config, cases, max } => eval(config.as_deref(), cases, max).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TollgateConfig> {
    let mut config = match path {
        Some(path) => TollgateConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TollgateConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn open_sessions(config: &TollgateConfig) -> anyhow::Result<SessionPersistence> {
    let Some(path) = &config.persistence.path else {
        info!("session persistence disabled");
        return Ok(SessionPersistence::Disabled);
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let store = SessionStore::open(path, config.persistence.history_cap)?;
    info!(path = ?path, "session store opened");
    Ok(SessionPersistence::Enabled(Arc::new(store)))
}

async fn serve(config_path: Option<&Path>, bind: Option<String>) -> anyhow::Result<()> {
    info!("Tollgate daemon starting");

    let config = load_config(config_path)?;
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let sessions = open_sessions(&config)?;
    let engine = Arc::new(Engine::from_config(config, sessions)?);

    let health = engine.health();
    info!(status = ?health.status, "initial health");

    let router = tollgate_api::build_router(engine);
    let listener = tokio::net::TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "API server listening");

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("Tollgate daemon stopped");
    Ok(())
}

async fn eval(config_path: Option<&Path>, cases: Vec<String>, max: Option<usize>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = Engine::from_config(config, SessionPersistence::Disabled)?;

    let selection = EvalSelection {
        case_ids: (!cases.is_empty()).then_some(cases),
        max_cases: max,
    };
    let report = engine.run_eval_as(&selection, EvalAccess::Privileged).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.summary.all_passed {
        anyhow::bail!(
            "{} of {} evaluation cases failed",
            report.summary.failed,
            report.summary.total
        );
    }
    Ok(())
}
