use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use strokecast_logging::SubscriberBuilder;
use strokecast_relay::{HubConfig, MaintenanceTask, Relay, RelayConfig, router};

/// Relay server for real-time stroke streaming
#[derive(Debug, Parser)]
#[command(name = "strokecast-relay", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides the config file)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log level or filter directive (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Human-readable console logs
    #[arg(long)]
    pretty: bool,

    /// Also write JSONL logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Accept WebSocket connections from any origin
    #[arg(long)]
    allow_any_origin: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => RelayConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.pretty {
            config.logging.pretty = true;
        }
        if let Some(dir) = &self.log_dir {
            config.logging.dir = Some(dir.clone());
        }
        if self.allow_any_origin {
            config.allow_any_origin = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = SubscriberBuilder::new()
        .with_config(config.log_config())
        .try_init()
        .context("initializing logging")?;

    let relay = Arc::new(Relay::new(HubConfig {
        outbound_buffer: config.outbound_buffer,
        gap: config.gap_config(),
    }));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let maintenance =
        MaintenanceTask::spawn(relay.clone(), config.maintenance_interval(), shutdown_rx);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(
        addr = %config.bind,
        origins = ?config.allowed_origins,
        allow_any_origin = config.allow_any_origin,
        "Relay listening"
    );

    let app = router(relay.clone(), Arc::new(config));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("serving")?;

    let _ = shutdown_tx.send(());
    maintenance.await.context("maintenance task")?;

    let stats = relay.stats();
    info!(
        forwarded = stats.packages_forwarded,
        dropped = stats.forwards_dropped,
        rejected = stats.packages_rejected,
        "Relay stopped"
    );
    Ok(())
}
