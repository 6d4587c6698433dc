//! Shared fixtures for integration tests
//!
//! `ScriptedFeed` replays prepared batches per field, `RecordingChannel` captures what the
//! dispatcher sends, and `spawn_server` runs a throwaway axum app on a local port.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tailwatch::airspace::AirspaceConfig;
use tailwatch::feed_client::PositionFeed;
use tailwatch::geometry::latitude_offset_nm;
use tailwatch::notifications::ChannelSender;
use tailwatch::position::PositionSample;
use tailwatch::tenant::{ChannelKind, TenantConfig, TrackedAircraft};
use uuid::Uuid;

/// Midday so the default quiet hours never apply
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 9, 12, 0, 0).unwrap()
}

/// Airborne sample `distance_nm` due north of the field, `tick` poll intervals after `base_time`
pub fn sample_north_of(
    icao24: &str,
    airspace: &AirspaceConfig,
    distance_nm: f64,
    tick: i64,
) -> PositionSample {
    PositionSample {
        icao24: icao24.to_string(),
        latitude: Some(latitude_offset_nm(airspace.center_latitude, distance_nm)),
        longitude: Some(airspace.center_longitude),
        baro_altitude_m: Some(airspace.field_elevation_ft_msl / 3.28084 + 450.0),
        on_ground: false,
        ground_speed_kts: Some(95.0),
        observed_at: base_time() + Duration::seconds(10 * tick),
    }
}

pub fn tenant_config(latitude: f64, longitude: f64, aircraft: &[(&str, &str)]) -> TenantConfig {
    TenantConfig {
        id: Uuid::new_v4(),
        name: None,
        airspace: AirspaceConfig::new(latitude, longitude, 650.0),
        aircraft: aircraft
            .iter()
            .map(|(icao24, tail)| TrackedAircraft::new(icao24, tail))
            .collect(),
        channels: vec![],
        alerts: vec![],
    }
}

type Scripted = Result<Vec<PositionSample>, String>;

/// Feed that replays queued responses per query center
#[derive(Default)]
pub struct ScriptedFeed {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: AtomicUsize,
}

fn center_key(latitude: f64, longitude: f64) -> String {
    format!("{:.4},{:.4}", latitude, longitude)
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, airspace: &AirspaceConfig, response: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(center_key(airspace.center_latitude, airspace.center_longitude))
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionFeed for ScriptedFeed {
    async fn fetch(&self, latitude: f64, longitude: f64, _radius_nm: f64) -> Result<Vec<PositionSample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&center_key(latitude, longitude))
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(samples)) => Ok(samples),
            Some(Err(reason)) => Err(anyhow::anyhow!(reason)),
            None => Ok(Vec::new()),
        }
    }
}

/// Channel that records every message, optionally failing each send
pub struct RecordingChannel {
    kind: ChannelKind,
    fail_with: Option<String>,
    sent: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            fail_with: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(kind: ChannelKind, reason: &str) -> Self {
        Self {
            kind,
            fail_with: Some(reason.to_string()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, message: &str) -> Result<()> {
        self.sent.lock().unwrap().push(message.to_string());
        match &self.fail_with {
            Some(reason) => Err(anyhow::anyhow!(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Serve `app` on an ephemeral local port
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
