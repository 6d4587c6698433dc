use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::position::{AltitudeUnit, FeedResponse, PositionSample};

pub const DEFAULT_FEED_BASE_URL: &str = "https://api.adsb.lol";

/// Position feed settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Unit of `alt_baro` in the feed response
    #[serde(default)]
    pub altitude_unit: AltitudeUnit,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            altitude_unit: AltitudeUnit::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_FEED_BASE_URL.to_string()
}

/// Source of position samples around a point
#[async_trait]
pub trait PositionFeed: Send + Sync {
    /// Fetch every aircraft the feed reports within `radius_nm` of the point
    async fn fetch(&self, latitude: f64, longitude: f64, radius_nm: f64) -> Result<Vec<PositionSample>>;
}

/// Result of one tenant's feed query within a tick
#[derive(Debug)]
pub enum FeedOutcome {
    Fetched(Vec<PositionSample>),
    Failed(String),
    TimedOut,
}

/// Query the feed with a hard deadline, folding every failure into the outcome
pub async fn fetch_with_timeout(
    feed: &dyn PositionFeed,
    latitude: f64,
    longitude: f64,
    radius_nm: f64,
    timeout: Duration,
) -> FeedOutcome {
    match tokio::time::timeout(timeout, feed.fetch(latitude, longitude, radius_nm)).await {
        Ok(Ok(samples)) => FeedOutcome::Fetched(samples),
        Ok(Err(e)) => {
            let timed_out = e
                .chain()
                .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
                .any(reqwest::Error::is_timeout);
            if timed_out {
                FeedOutcome::TimedOut
            } else {
                FeedOutcome::Failed(format!("{:#}", e))
            }
        }
        Err(_) => FeedOutcome::TimedOut,
    }
}

/// HTTP client for the adsb.lol style `/v2/lat/{lat}/lon/{lon}/dist/{radius}` endpoint
pub struct AdsbLolClient {
    client: Client,
    config: FeedConfig,
}

impl AdsbLolClient {
    pub fn new(config: FeedConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tailwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build feed HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn query_url(&self, latitude: f64, longitude: f64, radius_nm: f64) -> String {
        format!(
            "{}/v2/lat/{}/lon/{}/dist/{}",
            self.config.base_url.trim_end_matches('/'),
            latitude,
            longitude,
            radius_nm
        )
    }
}

#[async_trait]
impl PositionFeed for AdsbLolClient {
    async fn fetch(&self, latitude: f64, longitude: f64, radius_nm: f64) -> Result<Vec<PositionSample>> {
        let url = self.query_url(latitude, longitude, radius_nm);
        debug!(url = %url, "Querying position feed");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request to position feed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Position feed error {}: {}", status, body);
        }

        let fetched_at = Utc::now();
        let body: FeedResponse = response
            .json()
            .await
            .context("Failed to parse position feed response")?;

        let samples = body.into_samples(fetched_at, self.config.altitude_unit);
        debug!(count = samples.len(), "Position feed returned aircraft");
        Ok(samples)
    }
}
