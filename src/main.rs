//! graceful-reboot host service
//!
//! A small HTTP service whose listening socket survives hot reboots.
//!
//! # Architecture Overview
//!
//! ```text
//!     predecessor (fd 3) ──┐
//!                          ▼
//!     ┌─────────┐    ┌───────────┐    ┌─────────┐
//!     │ config  │───▶│ net       │───▶│ http    │◀── requests (WorkTracker)
//!     │ loader  │    │ listener  │    │ server  │
//!     └─────────┘    └─────┬─────┘    └────▲────┘
//!                          │ register      │ shutdown broadcast
//!                          ▼               │
//!                    ┌──────────────────────────┐
//!                    │ lifecycle                │◀── SIGINT / SIGTERM / SIGUSR2
//!                    │ shutdown · reboot        │
//!                    └────────────┬─────────────┘
//!                                 ▼
//!                          successor (fd 3)
//! ```
//!
//! Send the reboot signal (SIGUSR2 by default) to start a new instance on
//! the same socket; the old instance drains and exits.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use graceful_reboot::config::{self, GraceConfig};
use graceful_reboot::http::{HttpServer, InstanceInfo};
use graceful_reboot::lifecycle::{BoxError, Lifecycle};
use graceful_reboot::net::Listener;
use graceful_reboot::observability::{logging, metrics};

/// Per-request budget enforced by the timeout layer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "graceful-reboot")]
#[command(about = "HTTP service with graceful shutdown and hot reboot", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => GraceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!(pid = std::process::id(), "graceful-reboot v0.1.0 starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let lifecycle = Lifecycle::new(config.lifecycle.clone())?;

    let listener = Listener::bind_or_inherit(&config.listener).await?;
    let added = lifecycle.set_extract_proc_files([&listener])?;
    tracing::debug!(added, proc_files = ?lifecycle.proc_files(), "Listener registered for reboot");

    lifecycle.set_pre_close_hook(|| async {
        tracing::info!("pre-close hook invoked");
        Ok::<(), BoxError>(())
    });

    let instance = InstanceInfo::current(listener.origin());
    let server = HttpServer::new(lifecycle.clone(), instance, REQUEST_TIMEOUT);
    let watcher = lifecycle.watch_signals()?;

    tracing::info!(
        address = %listener.local_addr()?,
        origin = ?listener.origin(),
        "ready"
    );

    server.run(listener.into_inner()).await?;

    // The watcher exits the process once the attempt has been reported.
    if lifecycle.is_shutting_down() && config.lifecycle.signals_enabled {
        let _ = watcher.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
