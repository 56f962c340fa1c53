//! Onboard tracker daemon. Samples the bus position, publishes it, and
//! broadcasts ETA frames to nearby stations until stopped.

use buslink::config::Config;
use buslink::tracker::BusTrackerLoop;
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
    if let Err(e) = config.bus.validate() {
        error!(error = %e, "Invalid bus configuration");
        std::process::exit(1);
    }
    info!(bus_id = %config.bus.bus_id, "Loaded configuration");

    let tracker = match BusTrackerLoop::new(&config) {
        Ok(tracker) => tracker,
        Err(e) => {
            error!(error = %e, "Failed to build tracker");
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

    tracker.run(shutdown).await;
}
