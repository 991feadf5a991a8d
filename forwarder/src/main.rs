use clap::Parser;
use forwarder::{Forwarder, config::Settings, sink};
use log::{error, info};
use tokio::sync::oneshot;

/// Forwards battery telemetry from TCP producers to the ingestion backend.
#[derive(Parser, Debug)]
#[command(version, about = "Battery telemetry forwarder", long_about = None)]
struct Args {
    /// Configuration file (defaults to $FORWARDER_CONFIG, then forwarder/config.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref()).unwrap_or_else(|err| {
        error!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });

    let sink = sink::from_config(&settings.sink).unwrap_or_else(|err| {
        error!("Failed to set up {:?} sink: {}", settings.sink.kind, err);
        std::process::exit(1);
    });
    info!(
        "Delivering readings to the {:?} sink as '{}'",
        settings.sink.kind, settings.sink.source
    );

    let forwarder = Forwarder::bind(&settings.listener, settings.thresholds, sink)
        .await
        .unwrap_or_else(|err| {
            error!("{}", err);
            std::process::exit(1);
        });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(err) => {
                error!("Unable to listen for shutdown signal: {}", err);
                // Keep the sender alive so the forwarder runs until killed.
                let _keep = shutdown_tx;
                std::future::pending::<()>().await;
            }
        }
    });

    if let Err(err) = forwarder.run(shutdown_rx).await {
        error!("{}", err);
        std::process::exit(1);
    }

    info!("Forwarder stopped");
}
