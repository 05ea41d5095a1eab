use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use databroker::{LocalDataBroker, Vehicle};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vehicle_app::SmartWipersApp;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(about = "Turns the front wipers off whenever the hood is opened")]
struct Args {
    /// Settings file; defaults to ./smart_wipers.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Tracing filter directive, takes precedence over RUST_LOG.
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;

    let env_filter = match &args.log_filter {
        Some(filter) => EnvFilter::try_new(filter)?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&settings.log_filter))?,
    };
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!(plugin = %settings.plugin_name, "Starting SmartWipersApp...");
    let broker = LocalDataBroker::with_standard_signals();
    let app = SmartWipersApp::with_options(
        Vehicle::new(broker),
        plugins::default_registry(),
        settings.plugin_name.clone(),
        settings.startup_timing(),
    );

    app.run(shutdown_signal()).await?;
    info!("SmartWipersApp stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
