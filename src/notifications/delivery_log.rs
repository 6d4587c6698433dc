use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::tenant::{ChannelKind, TenantId};

/// Outcome of one channel attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed(String),
}

impl DeliveryStatus {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryStatus::Sent)
    }
}

/// One (event, channel) delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub aircraft: String,
    pub event_kind: String,
    pub message: String,
    pub channel: ChannelKind,
    #[serde(flatten)]
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
}

/// Sink for delivery records
#[async_trait]
pub trait DeliveryLog: Send + Sync {
    async fn record(&self, record: DeliveryRecord) -> Result<()>;
}

/// Keeps records in memory; used when no log file is configured
#[derive(Debug, Default)]
pub struct MemoryDeliveryLog {
    records: Mutex<Vec<DeliveryRecord>>,
}

impl MemoryDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DeliveryRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeliveryLog for MemoryDeliveryLog {
    async fn record(&self, record: DeliveryRecord) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| anyhow::anyhow!("Delivery log lock poisoned"))?
            .push(record);
        Ok(())
    }
}

/// Appends one JSON object per line to a file
#[derive(Debug)]
pub struct JsonlDeliveryLog {
    path: PathBuf,
    // Serializes appends so lines from concurrent sends never interleave
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlDeliveryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back, skipping lines that fail to parse
    pub async fn read_all(&self) -> Result<Vec<DeliveryRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read delivery log {:?}", self.path));
            }
        };
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[async_trait]
impl DeliveryLog for JsonlDeliveryLog {
    async fn record(&self, record: DeliveryRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record).context("Failed to serialize delivery record")?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open delivery log {:?}", self.path))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to delivery log {:?}", self.path))?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: DeliveryStatus) -> DeliveryRecord {
        DeliveryRecord {
            id: Uuid::now_v7(),
            tenant_id: Uuid::new_v4(),
            aircraft: "N123AB".to_string(),
            event_kind: "landing".to_string(),
            message: "**🛬 N123AB LANDING**".to_string(),
            channel: ChannelKind::Slack,
            status,
            sent_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(record(DeliveryStatus::Failed("HTTP 500".to_string()))).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "HTTP 500");
        assert_eq!(json["channel"], "slack");

        let json = serde_json::to_value(record(DeliveryStatus::Sent)).unwrap();
        assert_eq!(json["status"], "sent");
        assert!(json.get("reason").is_none());
    }

    #[tokio::test]
    async fn test_memory_log() {
        let log = MemoryDeliveryLog::new();
        log.record(record(DeliveryStatus::Sent)).await.unwrap();
        log.record(record(DeliveryStatus::Failed("timeout".to_string())))
            .await
            .unwrap();
        let records = log.records();
        assert_eq!(records.len(), 2);
        assert!(records[0].status.is_sent());
        assert!(!records[1].status.is_sent());
    }

    #[tokio::test]
    async fn test_jsonl_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlDeliveryLog::new(dir.path().join("deliveries.jsonl"));
        assert!(log.read_all().await.unwrap().is_empty());

        let first = record(DeliveryStatus::Sent);
        let second = record(DeliveryStatus::Failed("HTTP 404".to_string()));
        log.record(first.clone()).await.unwrap();
        log.record(second.clone()).await.unwrap();

        let records = log.read_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first.id);
        assert_eq!(records[1].status, second.status);
    }
}
