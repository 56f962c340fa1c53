//! Roadside receiver daemon. Listens for bus broadcasts, keeps the
//! arrivals board fresh, and publishes it until stopped.

use buslink::config::Config;
use buslink::receiver::StationReceiverLoop;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path, error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.station.validate() {
        error!(error = %e, "Invalid station configuration");
        std::process::exit(1);
    }
    info!(station_id = %config.station.station_id, "Loaded configuration");

    let receiver = match StationReceiverLoop::new(&config) {
        Ok(receiver) => receiver,
        Err(e) => {
            error!(error = %e, "Failed to build receiver");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal.cancel();
        }
    });

    receiver.run(shutdown).await;
}
