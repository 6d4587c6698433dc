use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tailwatch::config::{apply_tenants, spawn_config_watcher};
use tailwatch::feed_client::AdsbLolClient;
use tailwatch::metrics::{init_metrics, initialize_tracker_metrics, start_metrics_server};
use tailwatch::notifications::{
    ChannelFactory, DeliveryLog, JsonlDeliveryLog, MemoryDeliveryLog, NotificationDispatcher,
};
use tailwatch::scheduler::TrackingScheduler;
use tracing::{Instrument, error, info};

use super::load_config;

pub async fn handle_run(config_path: Option<PathBuf>) -> Result<()> {
    let (path, config) = load_config(config_path)?;

    // Recorder goes in before anything records
    let metrics_handle = match config.metrics_port {
        Some(_) => {
            let handle = init_metrics()?;
            initialize_tracker_metrics();
            Some(handle)
        }
        None => None,
    };

    let delivery_log: Arc<dyn DeliveryLog> = match &config.delivery_log.path {
        Some(log_path) => {
            info!(path = ?log_path, "Writing delivery records to file");
            Arc::new(JsonlDeliveryLog::new(log_path.clone()))
        }
        None => {
            info!("No delivery log path configured, keeping delivery records in memory");
            Arc::new(MemoryDeliveryLog::new())
        }
    };

    let settings = config.scheduler_settings();
    let feed = Arc::new(AdsbLolClient::new(config.feed.clone(), settings.feed_timeout)?);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        delivery_log,
        config.channel_timeout(),
    ));
    let factory = ChannelFactory::from_env(config.channel_timeout())?;
    let scheduler = Arc::new(TrackingScheduler::new(feed, dispatcher, settings));

    let summary = apply_tenants(&config, &scheduler, &factory).await;
    info!(
        registered = summary.registered,
        configured = config.tenants.len(),
        "Tenants loaded"
    );

    if let (Some(port), Some(handle)) = (config.metrics_port, metrics_handle) {
        let scheduler = scheduler.clone();
        tokio::spawn(
            async move {
                if let Err(e) = start_metrics_server(port, handle, scheduler).await {
                    error!(error = %format!("{:#}", e), "Metrics server stopped");
                }
            }
            .instrument(tracing::info_span!("metrics_server")),
        );
    }

    let watcher = spawn_config_watcher(path, scheduler.clone(), factory);
    scheduler.start()?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal (Ctrl+C), stopping after the current tick..."),
        Err(e) => error!(error = %e, "Unable to listen for shutdown signal, stopping"),
    }

    watcher.abort();
    scheduler.stop().await;
    info!("Graceful shutdown complete");
    Ok(())
}
