mod config;

use anyhow::Context;
use arbiter_a2a::{A2aClient, RemoteDirectory};
use arbiter_gateway::{AuthConfig, GatewayServer};
use arbiter_orchestrator::{DisputeRequest, WorkflowEngine, WorkflowResult};
use arbiter_registry::Registry;
use clap::{Parser, Subcommand};
use config::ArbiterConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "arbiter.toml";

#[derive(Parser)]
#[command(name = "arbiter", about = "Arbiter: A2A agent discovery and dispute orchestration")]
struct Cli {
    /// Path to config file. `arbiter.toml` is read when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the registry with its pollers and serve the gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List agents known to a registry server
    Discover {
        /// Registry server URL (overrides config and PROXY_URL)
        #[arg(long)]
        proxy_url: Option<String>,
        /// Include inactive agents
        #[arg(long)]
        all: bool,
    },
    /// Run one dispute workflow against the agents of a registry server
    Dispute {
        /// Registry server URL (overrides config and PROXY_URL)
        #[arg(long)]
        proxy_url: Option<String>,
        /// Transaction to dispute
        #[arg(long, env = "TEST_TX_ID", default_value = "TX12345")]
        txid: String,
        /// Reason for the dispute
        #[arg(long, env = "TEST_REASON", default_value = "Duplicate charge")]
        reason: String,
        /// Extra notes for the policy agent
        #[arg(long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `.env` may carry RUST_LOG, so it is read before the filter is built.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .json()
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), ".env file loaded");
    }

    let cli = Cli::parse();

    let (path, required) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let mut config = ArbiterConfig::load(&path, required)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Discover { proxy_url, all } => {
            let proxy = proxy_url_for(proxy_url, &config)?;
            discover(&proxy, all, &config).await
        }
        Commands::Dispute {
            proxy_url,
            txid,
            reason,
            notes,
        } => {
            let proxy = proxy_url_for(proxy_url, &config)?;
            let mut request = DisputeRequest::new(txid, reason);
            if let Some(notes) = notes {
                request = request.with_notes(notes);
            }
            dispute(&proxy, request, config).await
        }
    }
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn proxy_url_for(flag: Option<String>, config: &ArbiterConfig) -> anyhow::Result<String> {
    flag.or_else(|| config.proxy_url.clone())
        .context("PROXY_URL is not set; pass --proxy-url or set proxy_url in the config")
}

async fn serve(config: ArbiterConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let registry = Registry::start(&config.registry)?;
    info!(
        agents = registry.store().len(),
        poll_interval_secs = config.registry.poll_interval_secs,
        failure_threshold = config.registry.failure_threshold,
        "Registry started"
    );

    let client = A2aClient::new(config.engine.call_timeout())?;
    let engine = WorkflowEngine::new(
        Arc::new(registry.discovery()),
        Arc::new(client),
        config.engine.clone(),
    )?;

    let auth = AuthConfig::new(config.server.api_keys.clone());
    if auth.is_enabled() {
        info!(keys = auth.api_keys.len(), "API key auth enabled");
    }
    let app = GatewayServer::build_with_auth(registry.discovery(), Some(Arc::new(engine)), auth);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Arbiter gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("Shutting down pollers");
    registry.shutdown().await;
    Ok(())
}

async fn discover(proxy: &str, all: bool, config: &ArbiterConfig) -> anyhow::Result<()> {
    let directory = RemoteDirectory::new(proxy, config.engine.call_timeout())?;
    let agents = directory.list(!all).await?;

    if agents.is_empty() {
        println!("No agents discovered.");
        return Ok(());
    }
    for agent in &agents {
        println!(
            "{:<28} {:<9} {}",
            agent.id,
            agent.status.to_string(),
            agent.base_url
        );
        if !agent.capabilities.is_empty() {
            println!("    capabilities: {}", agent.capabilities.join(", "));
        }
    }
    println!("\nTotal: {} agent(s)", agents.len());
    Ok(())
}

async fn dispute(proxy: &str, request: DisputeRequest, config: ArbiterConfig) -> anyhow::Result<()> {
    info!(
        transaction_id = %request.transaction_id,
        reason = %request.reason,
        proxy = %proxy,
        "Running dispute"
    );
    let directory = RemoteDirectory::new(proxy, config.engine.call_timeout())?;
    let client = A2aClient::new(config.engine.call_timeout())?;
    let engine = WorkflowEngine::new(Arc::new(directory), Arc::new(client), config.engine)?;

    let instance = engine.run(request).await;
    println!("{}", serde_json::to_string_pretty(&instance)?);

    match instance.outcome {
        Some(WorkflowResult::Success { decision, .. }) => {
            info!(decision = %decision, "Dispute decided");
            Ok(())
        }
        Some(WorkflowResult::Failure { reason, message }) => {
            anyhow::bail!("dispute failed with {reason}: {message}")
        }
        None => anyhow::bail!("dispute ended without an outcome"),
    }
}
