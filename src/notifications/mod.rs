//! Notification dispatch
//!
//! Renders tracker events into messages and fans each one out to a tenant's enabled
//! channels. Every channel attempt is independent, bounded by the channel timeout and
//! written to the delivery log. Nothing is retried.

pub mod channels;
pub mod delivery_log;
pub mod templates;

pub use channels::{ChannelFactory, ChannelSender, EmailChannel, SmtpMailer, WebhookChannel};
pub use delivery_log::{
    DeliveryLog, DeliveryRecord, DeliveryStatus, JsonlDeliveryLog, MemoryDeliveryLog,
};
pub use templates::{TemplateChoice, TemplateSet};

use chrono::Utc;
use futures_util::future::join_all;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::airspace::QuietHours;
use crate::events::{NotificationEvent, TenantEvents};
use crate::tenant::{TenantConfig, TenantId};

pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

/// A tenant's notification settings, resolved into live senders
#[derive(Clone)]
pub struct TenantNotifier {
    pub channels: Vec<Arc<dyn ChannelSender>>,
    pub templates: TemplateSet,
    pub quiet_hours: QuietHours,
}

impl TenantNotifier {
    pub fn new(
        channels: Vec<Arc<dyn ChannelSender>>,
        templates: TemplateSet,
        quiet_hours: QuietHours,
    ) -> Self {
        Self {
            channels,
            templates,
            quiet_hours,
        }
    }

    pub fn from_config(config: &TenantConfig, factory: &ChannelFactory) -> Self {
        Self {
            channels: factory.build_enabled(&config.channels),
            templates: TemplateSet::from_settings(&config.alerts),
            quiet_hours: config.airspace.quiet_hours.clone(),
        }
    }
}

/// Counts from one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub suppressed_quiet_hours: usize,
    pub suppressed_disabled: usize,
}

pub struct NotificationDispatcher {
    log: Arc<dyn DeliveryLog>,
    channel_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(log: Arc<dyn DeliveryLog>, channel_timeout: Duration) -> Self {
        Self {
            log,
            channel_timeout,
        }
    }

    /// Render and deliver every event in the batch
    pub async fn dispatch(&self, notifier: &TenantNotifier, batch: &TenantEvents) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for event in &batch.events {
            let template = match notifier.templates.resolve(event.kind) {
                TemplateChoice::Render(template) => template,
                TemplateChoice::Disabled => {
                    debug!(tenant_id = %batch.tenant_id, kind = %event.kind, label = %event.label, "Alert kind disabled, not sending");
                    counter!("notifications.suppressed_disabled_total").increment(1);
                    summary.suppressed_disabled += 1;
                    continue;
                }
            };

            if notifier.quiet_hours.contains(event.timestamp) {
                info!(tenant_id = %batch.tenant_id, kind = %event.kind, label = %event.label, "Quiet hours, not sending");
                counter!("notifications.suppressed_quiet_hours_total").increment(1);
                summary.suppressed_quiet_hours += 1;
                continue;
            }

            let message = templates::render(&template, event, &notifier.quiet_hours);
            let records = self
                .deliver(batch.tenant_id, event, &message, &notifier.channels)
                .await;

            for record in records {
                if record.status.is_sent() {
                    summary.sent += 1;
                } else {
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Send one message through every channel concurrently and log each attempt
    async fn deliver(
        &self,
        tenant_id: TenantId,
        event: &NotificationEvent,
        message: &str,
        channels: &[Arc<dyn ChannelSender>],
    ) -> Vec<DeliveryRecord> {
        if channels.is_empty() {
            debug!(tenant_id = %tenant_id, kind = %event.kind, "No enabled channels");
            return Vec::new();
        }

        let attempts = channels
            .iter()
            .map(|channel| async move { (channel.kind(), self.send_one(channel.as_ref(), message).await) });
        let outcomes = join_all(attempts).await;

        let mut records = Vec::with_capacity(outcomes.len());
        for (channel, status) in outcomes {
            match &status {
                DeliveryStatus::Sent => {
                    counter!("notifications.sent_total", "channel" => channel.to_string()).increment(1);
                    info!(tenant_id = %tenant_id, channel = %channel, kind = %event.kind, label = %event.label, "Notification sent");
                }
                DeliveryStatus::Failed(reason) => {
                    counter!("notifications.failed_total", "channel" => channel.to_string()).increment(1);
                    warn!(tenant_id = %tenant_id, channel = %channel, kind = %event.kind, label = %event.label, reason = %reason, "Notification failed");
                }
            }

            let record = DeliveryRecord {
                id: Uuid::now_v7(),
                tenant_id,
                aircraft: event.label.clone(),
                event_kind: event.kind.to_string(),
                message: message.to_string(),
                channel,
                status,
                sent_at: Utc::now(),
            };
            if let Err(e) = self.log.record(record.clone()).await {
                warn!(tenant_id = %tenant_id, error = %e, "Failed to write delivery record");
            }
            records.push(record);
        }
        records
    }

    async fn send_one(&self, channel: &dyn ChannelSender, message: &str) -> DeliveryStatus {
        match tokio::time::timeout(self.channel_timeout, channel.send(message)).await {
            Ok(Ok(())) => DeliveryStatus::Sent,
            Ok(Err(e)) => DeliveryStatus::Failed(format!("{:#}", e)),
            Err(_) => DeliveryStatus::Failed(format!(
                "Timed out after {}s",
                self.channel_timeout.as_secs_f64()
            )),
        }
    }

    /// Send the fixed test message through one channel
    pub async fn send_test_notification(&self, channel: &dyn ChannelSender) -> DeliveryStatus {
        let message = templates::render_test_message(&channel.kind().to_string());
        self.send_one(channel, &message).await
    }
}
