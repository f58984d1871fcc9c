//! Radar hub store service
//!
//! Opens the store, repairs vessel indexes left by older writers, then logs
//! station status on an interval until Ctrl-C.

use std::time::Duration;

use radar_hub::config::AppConfig;
use radar_hub::hub::{RadarHub, StationSummary};
use radar_hub::RadarHubError;
use tokio::signal;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<(), RadarHubError> {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let hub = RadarHub::open(&config)?;
    if config.store.repair_indexes_on_start {
        hub.vessels().repair_indexes()?;
    }

    let shutdown_signal = signal::ctrl_c();

    tokio::select! {
        result = monitor_stations(hub.clone(), config.monitor.status_interval) => {
            info!("Station monitor stopped: {:?}", result);
        }
        _ = shutdown_signal => {
            info!("Received shutdown signal");
        }
    }

    hub.close();
    Ok(())
}

async fn monitor_stations(hub: RadarHub, period: Duration) -> Result<(), RadarHubError> {
    let mut interval = tokio::time::interval(period);
    let mut last: Option<StationSummary> = None;

    loop {
        interval.tick().await;
        match hub.station_summary_async().await {
            Ok(summary) if last != Some(summary) => {
                info!(
                    "{} of {} stations active",
                    summary.active, summary.total
                );
                last = Some(summary);
            }
            Ok(_) => debug!("Station status unchanged"),
            Err(e) => error!("Station status check failed: {}", e),
        }
    }
}
