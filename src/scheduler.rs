//! Tracking scheduler
//!
//! Owns every tenant's tracker and drives them from a single polling loop. Each tick polls
//! the feed once per tenant, concurrently, then feeds the tenant's tracker and dispatches
//! whatever events came out. A failure or panic in one tenant's work never reaches the
//! others or the loop.

use anyhow::Result;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::approach_tracker::{LiveAircraft, TenantTracker};
use crate::feed_client::{FeedOutcome, PositionFeed, fetch_with_timeout};
use crate::notifications::{DispatchSummary, NotificationDispatcher, TenantNotifier};
use crate::tenant::{TenantConfig, TenantId};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub poll_interval: Duration,
    pub feed_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            feed_timeout: DEFAULT_FEED_TIMEOUT,
        }
    }
}

/// Tracker and notification settings for one tenant, locked as a unit
struct TenantEntry {
    /// Snapshot the tracker was last built from
    config: TenantConfig,
    tracker: TenantTracker,
    notifier: TenantNotifier,
}

/// tenant_id -> entry; each entry has its own lock so tenants never wait on each other
type TenantRegistry = Arc<DashMap<TenantId, Arc<Mutex<TenantEntry>>>>;

/// What `register_or_update` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    Updated,
    /// Same snapshot as the running one; approach state kept
    Unchanged,
    Removed,
    Ignored,
}

/// Live view of one tenant
#[derive(Debug, Clone, Serialize)]
pub struct TenantStatus {
    pub tenant_id: TenantId,
    pub aircraft: Vec<LiveAircraft>,
}

/// Everything a tick needs, cheap to clone into spawned tasks
#[derive(Clone)]
struct TickContext {
    registry: TenantRegistry,
    feed: Arc<dyn PositionFeed>,
    dispatcher: Arc<NotificationDispatcher>,
    feed_timeout: Duration,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct TrackingScheduler {
    context: TickContext,
    poll_interval: Duration,
    running: std::sync::Mutex<Option<RunningLoop>>,
}

impl TrackingScheduler {
    pub fn new(
        feed: Arc<dyn PositionFeed>,
        dispatcher: Arc<NotificationDispatcher>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            context: TickContext {
                registry: Arc::new(DashMap::new()),
                feed,
                dispatcher,
                feed_timeout: settings.feed_timeout,
            },
            poll_interval: settings.poll_interval,
            running: std::sync::Mutex::new(None),
        }
    }

    /// Install or replace a tenant's configuration
    ///
    /// An existing tenant's tracker is rebuilt from scratch when its snapshot differs from
    /// the running one; an identical snapshot leaves the tracker alone. A tenant with no
    /// active aircraft is removed so it is no longer polled.
    pub async fn register_or_update(
        &self,
        config: &TenantConfig,
        notifier: TenantNotifier,
    ) -> Registration {
        let tenant_id = config.id;
        let aircraft = config.aircraft_set();

        if aircraft.is_empty() {
            if self.context.registry.remove(&tenant_id).is_some() {
                info!(tenant_id = %tenant_id, "Tenant has no active aircraft, removing");
                self.report_tenant_count();
                return Registration::Removed;
            }
            debug!(tenant_id = %tenant_id, "Tenant has no active aircraft, not registering");
            return Registration::Ignored;
        }

        let existing = match self.context.registry.entry(tenant_id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                info!(tenant_id = %tenant_id, aircraft = aircraft.len(), "Registering tenant");
                let tracker = TenantTracker::new(tenant_id, config.airspace.clone(), aircraft);
                entry.insert(Arc::new(Mutex::new(TenantEntry {
                    config: config.clone(),
                    tracker,
                    notifier,
                })));
                self.report_tenant_count();
                return Registration::Registered;
            }
        };

        let mut entry = existing.lock().await;
        entry.notifier = notifier;
        if entry.config == *config {
            debug!(tenant_id = %tenant_id, "Tenant config unchanged, keeping approach state");
            return Registration::Unchanged;
        }

        entry.tracker.rebuild(config.airspace.clone(), aircraft);
        entry.config = config.clone();
        info!(tenant_id = %tenant_id, aircraft = entry.tracker.aircraft().len(), "Tenant updated");
        Registration::Updated
    }

    /// Stop tracking a tenant; returns false if it was not registered
    pub fn unregister(&self, tenant_id: TenantId) -> bool {
        let removed = self.context.registry.remove(&tenant_id).is_some();
        if removed {
            info!(tenant_id = %tenant_id, "Tenant unregistered");
            self.report_tenant_count();
        }
        removed
    }

    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.context.registry.iter().map(|e| *e.key()).collect()
    }

    pub fn tenant_count(&self) -> usize {
        self.context.registry.len()
    }

    /// Snapshot of one tenant's aircraft; empty for unknown tenants
    pub async fn live_aircraft(&self, tenant_id: TenantId) -> Vec<LiveAircraft> {
        let entry = match self.context.registry.get(&tenant_id) {
            Some(entry) => entry.value().clone(),
            None => return Vec::new(),
        };
        let entry = entry.lock().await;
        entry.tracker.snapshot()
    }

    /// Snapshot of every tenant
    pub async fn status(&self) -> Vec<TenantStatus> {
        let entries: Vec<_> = self
            .context
            .registry
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();

        let mut statuses = Vec::with_capacity(entries.len());
        for (tenant_id, entry) in entries {
            let entry = entry.lock().await;
            statuses.push(TenantStatus {
                tenant_id,
                aircraft: entry.tracker.snapshot(),
            });
        }
        statuses.sort_by_key(|s| s.tenant_id);
        statuses
    }

    /// Run a single tick now, outside the polling loop
    pub async fn tick_once(&self) {
        run_tick(&self.context).await;
    }

    /// Start the polling loop
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            anyhow::bail!("Tracking scheduler already running");
        }

        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let context = self.context.clone();
        let poll_interval = self.poll_interval;

        info!(
            interval_secs = poll_interval.as_secs_f64(),
            tenants = self.tenant_count(),
            "Starting tracking scheduler"
        );

        let handle = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(poll_interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = loop_cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    if loop_cancel.is_cancelled() {
                        break;
                    }

                    // The tick runs as its own task so a panic is caught here instead of
                    // killing the loop
                    let tick_context = context.clone();
                    let started = Instant::now();
                    if let Err(e) = tokio::spawn(async move { run_tick(&tick_context).await }).await {
                        error!(error = %e, "Tracking tick failed");
                    }
                    counter!("tracker.ticks_total").increment(1);
                    histogram!("tracker.tick_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);
                }

                info!("Tracking scheduler stopped");
            }
            .instrument(tracing::info_span!("tracking_scheduler")),
        );

        *running = Some(RunningLoop { cancel, handle });
        Ok(())
    }

    /// Request cancellation and wait for the in-flight tick to finish
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(RunningLoop { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                error!(error = %e, "Tracking scheduler task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn report_tenant_count(&self) {
        gauge!("tracker.tenants_active").set(self.context.registry.len() as f64);
    }
}

/// Poll every registered tenant concurrently and wait for all of them
async fn run_tick(context: &TickContext) {
    let tenants: Vec<(TenantId, Arc<Mutex<TenantEntry>>)> = context
        .registry
        .iter()
        .map(|e| (*e.key(), e.value().clone()))
        .collect();

    gauge!("tracker.tenants_active").set(tenants.len() as f64);
    if tenants.is_empty() {
        return;
    }

    let mut tasks = JoinSet::new();
    for (tenant_id, entry) in tenants {
        let context = context.clone();
        tasks.spawn(
            async move { poll_tenant(&context, tenant_id, entry).await }
                .instrument(tracing::info_span!("tenant_tick", tenant_id = %tenant_id)),
        );
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!(error = %e, "Tenant tick task failed");
        }
    }
}

/// One tenant's share of a tick: fetch, ingest, dispatch
async fn poll_tenant(
    context: &TickContext,
    tenant_id: TenantId,
    entry: Arc<Mutex<TenantEntry>>,
) -> Option<DispatchSummary> {
    let (latitude, longitude, radius_nm) = {
        let entry = entry.lock().await;
        let airspace = entry.tracker.airspace();
        (
            airspace.center_latitude,
            airspace.center_longitude,
            airspace.query_radius_nm,
        )
    };

    let samples = match fetch_with_timeout(
        context.feed.as_ref(),
        latitude,
        longitude,
        radius_nm,
        context.feed_timeout,
    )
    .await
    {
        FeedOutcome::Fetched(samples) => {
            counter!("tracker.feed.fetched_total").increment(1);
            samples
        }
        FeedOutcome::Failed(reason) => {
            counter!("tracker.feed.failed_total").increment(1);
            warn!(tenant_id = %tenant_id, reason = %reason, "Feed query failed, skipping tenant this tick");
            return None;
        }
        FeedOutcome::TimedOut => {
            counter!("tracker.feed.timed_out_total").increment(1);
            warn!(
                tenant_id = %tenant_id,
                timeout_secs = context.feed_timeout.as_secs_f64(),
                "Feed query timed out, skipping tenant this tick"
            );
            return None;
        }
    };

    // The tenant may have been removed or re-registered while the request was in flight
    let still_registered = context
        .registry
        .get(&tenant_id)
        .is_some_and(|current| Arc::ptr_eq(current.value(), &entry));
    if !still_registered {
        debug!(tenant_id = %tenant_id, "Tenant removed during fetch, discarding samples");
        return None;
    }

    let (batch, notifier) = {
        let mut entry = entry.lock().await;
        let tracked: Vec<_> = samples
            .into_iter()
            .filter(|s| entry.tracker.aircraft().contains(&s.icao24.trim().to_ascii_lowercase()))
            .collect();
        debug!(tenant_id = %tenant_id, tracked = tracked.len(), "Ingesting feed batch");
        (entry.tracker.ingest_feed_batch(&tracked), entry.notifier.clone())
    };

    if batch.is_empty() {
        return None;
    }

    let summary = context.dispatcher.dispatch(&notifier, &batch).await;
    debug!(
        tenant_id = %tenant_id,
        events = batch.events.len(),
        sent = summary.sent,
        failed = summary.failed,
        "Dispatched tenant events"
    );
    Some(summary)
}
