//! Notification events produced by the approach trackers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::airspace::AlertKey;
use crate::tenant::TenantId;

/// What happened to the aircraft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Crossed an alert ring inbound
    Distance(AlertKey),
    /// Completed the inbound sequence through the landing ring
    Landing,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Distance(key) => write!(f, "{}", key),
            EventKind::Landing => write!(f, "landing"),
        }
    }
}

impl FromStr for EventKind {
    type Err = String;

    /// Parse `landing` or a ring label like `10nm` / `2.5nm`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("landing") {
            return Ok(EventKind::Landing);
        }
        s.strip_suffix("nm")
            .and_then(|n| n.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| EventKind::Distance(AlertKey::from_nm(d)))
            .ok_or_else(|| format!("Unknown event kind '{}'", s))
    }
}

/// A single event for one aircraft, ready to be rendered and dispatched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEvent {
    pub kind: EventKind,
    pub icao24: String,
    /// Display label (tail number)
    pub label: String,
    pub distance_nm: f64,
    pub altitude_agl_ft: Option<f64>,
    /// Estimated minutes to arrival, distance events only
    pub eta_minutes: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Events emitted by one tenant's tracker during a batch
#[derive(Debug, Clone, PartialEq)]
pub struct TenantEvents {
    pub tenant_id: TenantId,
    pub events: Vec<NotificationEvent>,
}

impl TenantEvents {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
