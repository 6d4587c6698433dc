use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::approach_tracker::LiveAircraft;
use crate::scheduler::{TenantStatus, TrackingScheduler};
use crate::tenant::ChannelKind;

/// Install the Prometheus recorder
/// Returns a handle that can be used to render metrics for scraping
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        // Tick duration buckets: 10ms .. 60s
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("tracker.tick_duration_ms".to_string()),
            &[
                10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
            ],
        )
        .context("Failed to set buckets for tracker.tick_duration_ms")?
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Initialize tracker metrics to zero/default values
/// This ensures metrics always appear in Prometheus queries even if no events have occurred
pub fn initialize_tracker_metrics() {
    // Scheduler
    metrics::counter!("tracker.ticks_total").absolute(0);
    metrics::gauge!("tracker.tenants_active").set(0.0);

    // Feed queries
    metrics::counter!("tracker.feed.fetched_total").absolute(0);
    metrics::counter!("tracker.feed.failed_total").absolute(0);
    metrics::counter!("tracker.feed.timed_out_total").absolute(0);

    // Samples and events
    metrics::counter!("tracker.samples_ingested_total").absolute(0);
    metrics::counter!("tracker.samples_skipped_total").absolute(0);
    metrics::counter!("tracker.events_emitted_total").absolute(0);
    metrics::counter!("tracker.events_suppressed_cooldown_total").absolute(0);

    // Notifications
    for channel in [
        ChannelKind::Discord,
        ChannelKind::Slack,
        ChannelKind::Teams,
        ChannelKind::Email,
    ] {
        metrics::counter!("notifications.sent_total", "channel" => channel.to_string()).absolute(0);
        metrics::counter!("notifications.failed_total", "channel" => channel.to_string()).absolute(0);
    }
    metrics::counter!("notifications.suppressed_quiet_hours_total").absolute(0);
    metrics::counter!("notifications.suppressed_disabled_total").absolute(0);
}

/// Read-only status routes over the scheduler's tenant snapshots
pub fn status_router(scheduler: Arc<TrackingScheduler>) -> Router {
    Router::new()
        .route("/status", get(all_tenants_status))
        .route("/status/{tenant_id}", get(tenant_status))
        .with_state(scheduler)
}

async fn all_tenants_status(
    State(scheduler): State<Arc<TrackingScheduler>>,
) -> Json<Vec<TenantStatus>> {
    Json(scheduler.status().await)
}

async fn tenant_status(
    State(scheduler): State<Arc<TrackingScheduler>>,
    Path(tenant_id): Path<Uuid>,
) -> Json<Vec<LiveAircraft>> {
    Json(scheduler.live_aircraft(tenant_id).await)
}

/// Serve `/metrics` and the status routes on the specified port
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
    scheduler: Arc<TrackingScheduler>,
) -> Result<()> {
    let app = Router::new()
        .route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        )
        .merge(status_router(scheduler));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting metrics server on http://{}/metrics", addr);
    info!("Tenant status available at http://{}/status", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Metrics server failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_counters_start_labelled_per_channel() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, initialize_tracker_metrics);

        let rendered = handle.render();
        for name in ["notifications_sent_total", "notifications_failed_total"] {
            let series: Vec<&str> = rendered
                .lines()
                .filter(|l| l.starts_with(name) && !l.starts_with('#'))
                .collect();
            assert_eq!(series.len(), 4, "{}: {:?}", name, series);
            assert!(series.iter().all(|l| l.contains("channel=\"")), "{:?}", series);
            assert!(series.iter().any(|l| l.contains("channel=\"email\"")));
        }
    }
}
