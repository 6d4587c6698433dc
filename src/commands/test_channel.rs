use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tailwatch::notifications::{
    ChannelFactory, DeliveryStatus, MemoryDeliveryLog, NotificationDispatcher,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::load_config;

pub async fn handle_test_channel(
    config_path: Option<PathBuf>,
    tenant_id: Uuid,
    kind: Option<String>,
) -> Result<()> {
    let (_, config) = load_config(config_path)?;
    let tenant = config
        .tenant(tenant_id)
        .with_context(|| format!("Tenant {} not found in config", tenant_id))?;

    let factory = ChannelFactory::from_env(config.channel_timeout())?;
    let dispatcher = NotificationDispatcher::new(
        Arc::new(MemoryDeliveryLog::new()),
        config.channel_timeout(),
    );

    let kind = kind.map(|k| k.to_ascii_lowercase());
    let channels: Vec<_> = factory
        .build_enabled(&tenant.channels)
        .into_iter()
        .filter(|c| kind.as_deref().is_none_or(|k| c.kind().to_string() == k))
        .collect();

    if channels.is_empty() {
        anyhow::bail!("Tenant {} has no matching enabled channels", tenant_id);
    }

    let mut failures = 0;
    for channel in channels {
        match dispatcher.send_test_notification(channel.as_ref()).await {
            DeliveryStatus::Sent => info!(channel = %channel.kind(), "Test notification sent"),
            DeliveryStatus::Failed(reason) => {
                failures += 1;
                warn!(channel = %channel.kind(), reason = %reason, "Test notification failed");
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} channel(s) failed", failures);
    }
    Ok(())
}
