//! Tenant configuration snapshot
//!
//! A tenant is one independent account: its own field, its own aircraft and its own
//! notification channels. The tracking engine only ever reads these values; every change
//! arrives as a fresh snapshot through `TrackingScheduler::register_or_update`.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

use crate::airspace::AirspaceConfig;
use crate::events::EventKind;

pub type TenantId = Uuid;

/// An aircraft a tenant wants to follow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedAircraft {
    /// ICAO 24-bit address as 6 hex digits
    pub icao24: String,
    pub tail_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl TrackedAircraft {
    pub fn new(icao24: &str, tail_number: &str) -> Self {
        Self {
            icao24: icao24.to_string(),
            tail_number: tail_number.to_string(),
            friendly_name: None,
            active: true,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let hex = self.icao24.trim();
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "Aircraft {}: icao24 must be 6 hex digits, got '{}'",
                self.tail_number, self.icao24
            ));
        }
        if self.tail_number.trim().is_empty() {
            return Err(format!("Aircraft {}: tail number is required", self.icao24));
        }
        Ok(())
    }
}

/// Active tracked aircraft keyed by lowercase icao24, mapped to their display label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftSet {
    labels: HashMap<String, String>,
}

impl AircraftSet {
    pub fn from_aircraft(aircraft: &[TrackedAircraft]) -> Self {
        let labels = aircraft
            .iter()
            .filter(|a| a.active && !a.icao24.trim().is_empty())
            .map(|a| (a.icao24.trim().to_ascii_lowercase(), a.tail_number.clone()))
            .collect();
        Self { labels }
    }

    pub fn label(&self, icao24: &str) -> Option<&str> {
        self.labels.get(icao24).map(String::as_str)
    }

    pub fn contains(&self, icao24: &str) -> bool {
        self.labels.contains_key(icao24)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Outbound channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Discord,
    Slack,
    Teams,
    Email,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Discord => write!(f, "discord"),
            ChannelKind::Slack => write!(f, "slack"),
            ChannelKind::Teams => write!(f, "teams"),
            ChannelKind::Email => write!(f, "email"),
        }
    }
}

/// Channel settings as configured by the tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChannelConfig {
    Discord {
        #[serde(default)]
        webhook_url: Option<String>,
        #[serde(default = "default_true")]
        enabled: bool,
    },
    Slack {
        #[serde(default)]
        webhook_url: Option<String>,
        #[serde(default = "default_true")]
        enabled: bool,
    },
    Teams {
        #[serde(default)]
        webhook_url: Option<String>,
        #[serde(default = "default_true")]
        enabled: bool,
    },
    Email {
        to: String,
        #[serde(default)]
        to_name: Option<String>,
        #[serde(default = "default_true")]
        enabled: bool,
    },
}

impl ChannelConfig {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelConfig::Discord { .. } => ChannelKind::Discord,
            ChannelConfig::Slack { .. } => ChannelKind::Slack,
            ChannelConfig::Teams { .. } => ChannelKind::Teams,
            ChannelConfig::Email { .. } => ChannelKind::Email,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            ChannelConfig::Discord { enabled, .. }
            | ChannelConfig::Slack { enabled, .. }
            | ChannelConfig::Teams { enabled, .. }
            | ChannelConfig::Email { enabled, .. } => *enabled,
        }
    }
}

/// Per-kind alert setting: template override and on/off switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSetting {
    /// Event kind, e.g. "10nm" or "landing"
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub message_template: String,
}

impl AlertSetting {
    pub fn validate(&self) -> Result<(), String> {
        self.event_kind().map(|_| ()).map_err(|_| {
            format!(
                "Alert kind '{}' must be 'landing' or a distance like '10nm'",
                self.kind
            )
        })
    }

    pub fn event_kind(&self) -> Result<EventKind, String> {
        self.kind.parse()
    }
}

/// Complete configuration snapshot for one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: TenantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub airspace: AirspaceConfig,
    #[serde(default)]
    pub aircraft: Vec<TrackedAircraft>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub alerts: Vec<AlertSetting>,
}

impl TenantConfig {
    pub fn aircraft_set(&self) -> AircraftSet {
        AircraftSet::from_aircraft(&self.aircraft)
    }

    /// Validate the tenant snapshot
    pub fn validate(&self) -> Result<(), String> {
        self.airspace
            .validate()
            .map_err(|e| format!("Tenant {}: {}", self.id, e))?;

        let mut seen = HashSet::new();
        for aircraft in &self.aircraft {
            aircraft
                .validate()
                .map_err(|e| format!("Tenant {}: {}", self.id, e))?;
            if !seen.insert(aircraft.icao24.trim().to_ascii_lowercase()) {
                return Err(format!(
                    "Tenant {}: aircraft {} listed more than once",
                    self.id, aircraft.icao24
                ));
            }
        }

        for alert in &self.alerts {
            alert
                .validate()
                .map_err(|e| format!("Tenant {}: {}", self.id, e))?;
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aircraft_set_is_case_insensitive_and_skips_inactive() {
        let mut parked = TrackedAircraft::new("0000AA", "N100PK");
        parked.active = false;
        let set = AircraftSet::from_aircraft(&[
            TrackedAircraft::new("A1B2C3", "N123AB"),
            TrackedAircraft::new(" d4e5f6 ", "N456CD"),
            parked,
        ]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.label("a1b2c3"), Some("N123AB"));
        assert_eq!(set.label("d4e5f6"), Some("N456CD"));
        assert!(!set.contains("0000aa"));
    }

    #[test]
    fn test_tracked_aircraft_validation() {
        assert!(TrackedAircraft::new("a1b2c3", "N1").validate().is_ok());
        assert!(TrackedAircraft::new("a1b2c", "N1").validate().is_err());
        assert!(TrackedAircraft::new("zzzzzz", "N1").validate().is_err());
        assert!(TrackedAircraft::new("a1b2c3", " ").validate().is_err());
    }

    #[test]
    fn test_alert_setting_kinds() {
        let setting = |kind: &str| AlertSetting {
            kind: kind.to_string(),
            enabled: true,
            message_template: "{tail}".to_string(),
        };
        assert!(setting("landing").validate().is_ok());
        assert!(setting("10nm").validate().is_ok());
        assert!(setting("2.5nm").validate().is_ok());
        assert!(setting("nm").validate().is_err());
        assert!(setting("takeoff").validate().is_err());
    }

    #[test]
    fn test_channel_config_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            channels: Vec<ChannelConfig>,
        }

        let wrapper: Wrapper = toml::from_str(
            r#"
            [[channels]]
            kind = "discord"
            webhook_url = "https://discord.example/hook"

            [[channels]]
            kind = "email"
            to = "ops@example.com"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(wrapper.channels[0].kind(), ChannelKind::Discord);
        assert!(wrapper.channels[0].enabled());
        assert_eq!(wrapper.channels[1].kind(), ChannelKind::Email);
        assert!(!wrapper.channels[1].enabled());
    }

    #[test]
    fn test_duplicate_aircraft_rejected() {
        let config = TenantConfig {
            id: Uuid::new_v4(),
            name: None,
            airspace: AirspaceConfig::new(42.0, -71.0, 100.0),
            aircraft: vec![
                TrackedAircraft::new("a1b2c3", "N1"),
                TrackedAircraft::new("A1B2C3", "N2"),
            ],
            channels: vec![],
            alerts: vec![],
        };
        assert!(config.validate().is_err());
    }
}
