use anyhow::Result;
use clap::{Parser, Subcommand};
use panelforge::config::Config;
use panelforge::engine::{ResultCache, build_engine};
use panelforge::gateway::run_gateway;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "panelforge", about = "AI orchestration backend for the PanelForge layout studio")]
struct Cli {
    /// Path to config.toml (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (default)
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate config and pipeline references, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::CheckConfig => check_config(&config),
    }
}

async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let engine = Arc::new(build_engine(&config)?);

    // The sweeper and the gateway share one shutdown token so ctrl-c stops
    // both cleanly.
    let shutdown = CancellationToken::new();
    let sweeper = ResultCache::spawn_sweeper(
        Arc::clone(engine.cache()),
        Duration::from_secs(config.cache.sweep_interval_secs),
        shutdown.clone(),
    );

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);
    run_gateway(&host, port, engine, shutdown).await?;

    sweeper.await?;
    Ok(())
}

fn check_config(config: &Config) -> Result<()> {
    let engine = build_engine(config)?;
    let providers = engine.providers().list();
    let available = providers.iter().filter(|p| p.available).count();

    println!("config ok: {}", config.config_path.display());
    println!(
        "providers: {} registered, {} configured",
        providers.len(),
        available
    );
    for pipeline in engine.pipelines().list() {
        println!(
            "pipeline {}: providers [{}]",
            pipeline.id,
            pipeline.provider_preference.join(", ")
        );
    }
    if available == 0 {
        tracing::warn!("no provider has credentials; every execute call will fail");
    }
    Ok(())
}
