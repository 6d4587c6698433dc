//! Service configuration file
//!
//! One TOML file holds the service settings and every tenant. The file is the only source
//! of tenant configuration: a watcher reloads it on change and pushes each tenant into the
//! scheduler as a fresh snapshot.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info};

use crate::feed_client::FeedConfig;
use crate::notifications::{ChannelFactory, TenantNotifier};
use crate::scheduler::{Registration, SchedulerSettings, TrackingScheduler};
use crate::tenant::TenantConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLogConfig {
    /// JSON-lines file for delivery records; records stay in memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_feed_timeout_secs")]
    pub feed_timeout_secs: u64,
    #[serde(default = "default_channel_timeout_secs")]
    pub channel_timeout_secs: u64,
    /// Port for the Prometheus `/metrics` and `/status` server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub delivery_log: DeliveryLogConfig,
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            feed_timeout_secs: default_feed_timeout_secs(),
            channel_timeout_secs: default_channel_timeout_secs(),
            metrics_port: None,
            feed: FeedConfig::default(),
            delivery_log: DeliveryLogConfig::default(),
            tenants: Vec::new(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_feed_timeout_secs() -> u64 {
    30
}

fn default_channel_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    /// Load and validate config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: ServiceConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid config {:?}: {}", path, e))?;
        Ok(config)
    }

    /// Save config to a TOML file (atomic: write to .tmp then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, &contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", tmp_path, path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be at least 1".to_string());
        }
        if self.feed_timeout_secs == 0 {
            return Err("feed_timeout_secs must be at least 1".to_string());
        }
        if self.channel_timeout_secs == 0 {
            return Err("channel_timeout_secs must be at least 1".to_string());
        }
        if self.feed.base_url.trim().is_empty() {
            return Err("feed.base_url is required".to_string());
        }

        let mut ids = HashSet::new();
        for tenant in &self.tenants {
            if !ids.insert(tenant.id) {
                return Err(format!("Tenant {} is defined more than once", tenant.id));
            }
            tenant.validate()?;
        }
        Ok(())
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            feed_timeout: Duration::from_secs(self.feed_timeout_secs),
        }
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_secs(self.channel_timeout_secs)
    }

    pub fn tenant(&self, id: uuid::Uuid) -> Option<&TenantConfig> {
        self.tenants.iter().find(|t| t.id == id)
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `TAILWATCH_CONFIG` env var
/// 2. `/etc/tailwatch/tailwatch.toml` (production/staging)
/// 3. `./tailwatch.toml` (development)
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("TAILWATCH_CONFIG") {
        return PathBuf::from(path);
    }

    match std::env::var("TAILWATCH_ENV").as_deref() {
        Ok("production") | Ok("staging") => PathBuf::from("/etc/tailwatch/tailwatch.toml"),
        _ => PathBuf::from("./tailwatch.toml"),
    }
}

/// Counts from applying a config to the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub registered: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

/// Push every tenant in the config into the scheduler and drop tenants no longer present
pub async fn apply_tenants(
    config: &ServiceConfig,
    scheduler: &TrackingScheduler,
    factory: &ChannelFactory,
) -> ApplySummary {
    let mut summary = ApplySummary::default();

    for tenant in &config.tenants {
        let notifier = TenantNotifier::from_config(tenant, factory);
        match scheduler.register_or_update(tenant, notifier).await {
            Registration::Registered => summary.registered += 1,
            Registration::Updated => summary.updated += 1,
            Registration::Unchanged => summary.unchanged += 1,
            Registration::Removed => summary.removed += 1,
            Registration::Ignored => {}
        }
    }

    let wanted: HashSet<_> = config.tenants.iter().map(|t| t.id).collect();
    for tenant_id in scheduler.tenant_ids() {
        if !wanted.contains(&tenant_id) && scheduler.unregister(tenant_id) {
            summary.removed += 1;
        }
    }

    summary
}

/// Spawn a file watcher that reloads the config and re-applies tenants on modification.
///
/// A file that fails to load or validate is logged and ignored; the running tenants keep
/// their previous configuration.
pub fn spawn_config_watcher(
    path: PathBuf,
    scheduler: Arc<TrackingScheduler>,
    factory: ChannelFactory,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            use notify::{Event, EventKind, RecursiveMode, Watcher};

            let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);

            // Watch the parent directory since the file may be atomically replaced
            let watch_dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();

            let mut watcher = match notify::recommended_watcher(move |res: Result<Event, _>| {
                if let Ok(event) = res
                    && matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                    && event.paths.iter().any(|p| p.ends_with(&file_name))
                {
                    let _ = tx.try_send(());
                }
            }) {
                Ok(w) => w,
                Err(e) => {
                    error!(error = %e, "Failed to create file watcher");
                    return;
                }
            };

            if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
                error!(error = %e, path = ?watch_dir, "Failed to watch directory");
                return;
            }

            info!(path = ?path, "Config file watcher started");

            loop {
                if rx.recv().await.is_none() {
                    break;
                }

                // Debounce: drain any additional events within 500ms
                tokio::time::sleep(Duration::from_millis(500)).await;
                while rx.try_recv().is_ok() {}

                info!(path = ?path, "Config file changed, reloading...");

                match ServiceConfig::load(&path) {
                    Ok(config) => {
                        let summary = apply_tenants(&config, &scheduler, &factory).await;
                        info!(
                            registered = summary.registered,
                            updated = summary.updated,
                            unchanged = summary.unchanged,
                            removed = summary.removed,
                            tenants = scheduler.tenant_count(),
                            "Config reloaded successfully"
                        );
                    }
                    Err(e) => {
                        error!(error = %format!("{:#}", e), "Failed to reload config file, keeping previous tenants");
                    }
                }
            }
        }
        .instrument(tracing::info_span!("config_watcher")),
    )
}
