//! Airspace configuration and containment checks
//!
//! Each tenant watches a single cylinder of airspace around its field: a horizontal radius
//! around the field center and a vertical band measured above the field elevation.
//! Alert distances form concentric rings outside (or inside) that cylinder.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::geometry::{altitude_agl_ft, haversine_distance_nm};
use crate::position::PositionSample;

/// Alert boundaries used when a tenant does not configure its own
pub const DEFAULT_ALERT_DISTANCES_NM: [f64; 3] = [10.0, 5.0, 2.0];

/// Longest notification cooldown a tenant may configure (one day)
pub const MAX_COOLDOWN_SECS: u64 = 86_400;

/// Identity of an alert boundary, in tenths of a nautical mile
///
/// Distances are configured as floats; keying fired alerts on tenths keeps the
/// bookkeeping hashable and stable across config reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertKey(u32);

impl AlertKey {
    pub fn from_nm(distance_nm: f64) -> Self {
        Self((distance_nm * 10.0).round().max(0.0) as u32)
    }

    pub fn nm(&self) -> f64 {
        f64::from(self.0) / 10.0
    }
}

impl fmt::Display for AlertKey {
    /// `10nm` for whole miles, `2.5nm` otherwise
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 10 == 0 {
            write!(f, "{}nm", self.0 / 10)
        } else {
            write!(f, "{}.{}nm", self.0 / 10, self.0 % 10)
        }
    }
}

/// A configured alert ring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertDistance {
    pub distance_nm: f64,
    pub key: AlertKey,
}

impl AlertDistance {
    pub fn new(distance_nm: f64) -> Self {
        Self {
            distance_nm,
            key: AlertKey::from_nm(distance_nm),
        }
    }
}

/// Daily window during which notifications are held back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuietHours {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(with = "hhmm", default = "default_quiet_start")]
    pub start: NaiveTime,
    #[serde(with = "hhmm", default = "default_quiet_end")]
    pub end: NaiveTime,
    /// Offset of the tenant's local clock from UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: true,
            start: default_quiet_start(),
            end: default_quiet_end(),
            utc_offset_minutes: 0,
        }
    }
}

impl QuietHours {
    /// Wall-clock time on the tenant's clock
    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveTime {
        (at + Duration::minutes(i64::from(self.utc_offset_minutes))).time()
    }

    /// Check whether an instant falls inside the window `[start, end)` on the tenant's clock.
    /// A window whose start is after its end wraps midnight.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if !self.enabled || self.start == self.end {
            return false;
        }

        let local = self.local_time(at);
        if self.start < self.end {
            local >= self.start && local < self.end
        } else {
            local >= self.start || local < self.end
        }
    }
}

/// Airspace and alerting settings for one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirspaceConfig {
    pub center_latitude: f64,
    pub center_longitude: f64,
    pub field_elevation_ft_msl: f64,
    #[serde(default)]
    pub floor_ft_agl: f64,
    #[serde(default = "default_ceiling")]
    pub ceiling_ft_agl: f64,
    /// Horizontal containment radius in nautical miles
    #[serde(default = "default_radius")]
    pub radius_nm: f64,
    /// Radius handed to the position feed query
    #[serde(default = "default_query_radius")]
    pub query_radius_nm: f64,
    #[serde(default = "default_alert_distances")]
    pub alert_distances_nm: Vec<f64>,
    #[serde(default = "default_cooldown_secs")]
    pub notification_cooldown_secs: u64,
    #[serde(default)]
    pub quiet_hours: QuietHours,
}

impl AirspaceConfig {
    /// Create a config centered on a field with default alerting settings
    pub fn new(center_latitude: f64, center_longitude: f64, field_elevation_ft_msl: f64) -> Self {
        Self {
            center_latitude,
            center_longitude,
            field_elevation_ft_msl,
            floor_ft_agl: 0.0,
            ceiling_ft_agl: default_ceiling(),
            radius_nm: default_radius(),
            query_radius_nm: default_query_radius(),
            alert_distances_nm: default_alert_distances(),
            notification_cooldown_secs: default_cooldown_secs(),
            quiet_hours: QuietHours::default(),
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&self.center_latitude) {
            return Err("Latitude must be between -90 and 90".to_string());
        }
        if !(-180.0..=180.0).contains(&self.center_longitude) {
            return Err("Longitude must be between -180 and 180".to_string());
        }
        if !(self.radius_nm > 0.0) {
            return Err("Airspace radius must be positive".to_string());
        }
        if !(self.query_radius_nm > 0.0) {
            return Err("Query radius must be positive".to_string());
        }
        if self.ceiling_ft_agl <= self.floor_ft_agl {
            return Err("Ceiling must be greater than floor".to_string());
        }
        if self.alert_distances_nm.is_empty() {
            return Err("At least one alert distance is required".to_string());
        }
        if self.notification_cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(format!(
                "Notification cooldown must be at most {} seconds",
                MAX_COOLDOWN_SECS
            ));
        }
        for (i, distance) in self.alert_distances_nm.iter().enumerate() {
            if !(*distance > 0.0) {
                return Err(format!("Alert distance {}: must be positive", i + 1));
            }
        }
        Ok(())
    }

    /// Alert rings sorted farthest first, duplicates removed
    pub fn sorted_alert_distances(&self) -> Vec<AlertDistance> {
        let mut distances: Vec<AlertDistance> = self
            .alert_distances_nm
            .iter()
            .map(|d| AlertDistance::new(*d))
            .collect();
        distances.sort_by(|a, b| b.key.cmp(&a.key));
        distances.dedup_by_key(|d| d.key);
        distances
    }

    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.notification_cooldown_secs.min(MAX_COOLDOWN_SECS) as i64)
    }
}

/// Where a sample sits relative to a tenant's airspace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirspaceCheck {
    pub distance_nm: f64,
    pub altitude_agl_ft: Option<f64>,
    pub horizontal: bool,
    pub vertical: bool,
}

impl AirspaceCheck {
    /// Inside both the radius and the altitude band
    pub fn contained(&self) -> bool {
        self.horizontal && self.vertical
    }
}

/// Check a sample against an airspace
///
/// Samples without a barometric altitude take their vertical containment from the
/// ground flag: an aircraft on the ground counts as inside the band.
pub fn check_sample_against_airspace(
    sample: &PositionSample,
    latitude: f64,
    longitude: f64,
    airspace: &AirspaceConfig,
) -> AirspaceCheck {
    let distance_nm = haversine_distance_nm(
        airspace.center_latitude,
        airspace.center_longitude,
        latitude,
        longitude,
    );
    let altitude_agl_ft = altitude_agl_ft(sample.baro_altitude_m, airspace.field_elevation_ft_msl);

    let vertical = match altitude_agl_ft {
        Some(agl) => airspace.floor_ft_agl <= agl && agl <= airspace.ceiling_ft_agl,
        None => sample.on_ground,
    };

    AirspaceCheck {
        distance_nm,
        altitude_agl_ft,
        horizontal: distance_nm <= airspace.radius_nm,
        vertical,
    }
}

fn default_true() -> bool {
    true
}

fn default_ceiling() -> f64 {
    2500.0
}

fn default_radius() -> f64 {
    4.0
}

fn default_query_radius() -> f64 {
    100.0
}

fn default_alert_distances() -> Vec<f64> {
    DEFAULT_ALERT_DISTANCES_NM.to_vec()
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_quiet_start() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 0, 0).unwrap_or_default()
}

fn default_quiet_end() -> NaiveTime {
    NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default()
}

/// `HH:MM` serialization for quiet-hours boundaries
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::latitude_offset_nm;
    use chrono::TimeZone;

    fn sample_at(lat: f64, lon: f64, baro_altitude_m: Option<f64>, on_ground: bool) -> PositionSample {
        PositionSample {
            icao24: "a1b2c3".to_string(),
            latitude: Some(lat),
            longitude: Some(lon),
            baro_altitude_m,
            on_ground,
            ground_speed_kts: Some(90.0),
            observed_at: Utc::now(),
        }
    }

    fn field() -> AirspaceConfig {
        AirspaceConfig::new(40.0, -74.0, 100.0)
    }

    fn check(sample: &PositionSample, airspace: &AirspaceConfig) -> AirspaceCheck {
        check_sample_against_airspace(
            sample,
            sample.latitude.unwrap(),
            sample.longitude.unwrap(),
            airspace,
        )
    }

    #[test]
    fn test_alert_key_labels() {
        assert_eq!(AlertKey::from_nm(10.0).to_string(), "10nm");
        assert_eq!(AlertKey::from_nm(2.0).to_string(), "2nm");
        assert_eq!(AlertKey::from_nm(2.5).to_string(), "2.5nm");
        assert_eq!(AlertKey::from_nm(5.0).nm(), 5.0);
    }

    #[test]
    fn test_sorted_alert_distances_farthest_first() {
        let mut airspace = field();
        airspace.alert_distances_nm = vec![2.0, 10.0, 5.0, 10.0];
        let sorted: Vec<f64> = airspace
            .sorted_alert_distances()
            .iter()
            .map(|d| d.distance_nm)
            .collect();
        assert_eq!(sorted, vec![10.0, 5.0, 2.0]);
    }

    #[test]
    fn test_inside_radius_and_band() {
        let airspace = field();
        // 2 nm north, 1500 ft MSL -> 1400 ft AGL
        let lat = latitude_offset_nm(40.0, 2.0);
        let sample = sample_at(lat, -74.0, Some(1500.0 / 3.28084), false);
        let result = check(&sample, &airspace);
        assert!(result.horizontal);
        assert!(result.vertical);
        assert!(result.contained());
        assert!((result.distance_nm - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_outside_radius() {
        let airspace = field();
        let lat = latitude_offset_nm(40.0, 6.0);
        let sample = sample_at(lat, -74.0, Some(500.0), false);
        let result = check(&sample, &airspace);
        assert!(!result.horizontal);
        assert!(!result.contained());
    }

    #[test]
    fn test_above_ceiling() {
        let airspace = field();
        // 2000 m is ~6560 ft MSL, well above the 2500 ft AGL ceiling
        let sample = sample_at(40.0, -74.0, Some(2000.0), false);
        let result = check(&sample, &airspace);
        assert!(result.horizontal);
        assert!(!result.vertical);
    }

    #[test]
    fn test_ground_counts_as_vertically_contained() {
        let airspace = field();
        let on_ground = sample_at(40.0, -74.0, None, true);
        assert!(check(&on_ground, &airspace).vertical);
        assert_eq!(check(&on_ground, &airspace).altitude_agl_ft, None);

        let no_altitude_airborne = sample_at(40.0, -74.0, None, false);
        assert!(!check(&no_altitude_airborne, &airspace).vertical);
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        assert!(field().validate().is_ok());

        let mut bad = field();
        bad.center_latitude = 91.0;
        assert!(bad.validate().is_err());

        let mut bad = field();
        bad.ceiling_ft_agl = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = field();
        bad.alert_distances_nm = vec![];
        assert!(bad.validate().is_err());

        let mut bad = field();
        bad.alert_distances_nm = vec![5.0, -1.0];
        assert!(bad.validate().is_err());

        let mut bad = field();
        bad.radius_nm = f64::NAN;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_cooldown_is_bounded() {
        let mut airspace = field();
        airspace.notification_cooldown_secs = MAX_COOLDOWN_SECS;
        assert!(airspace.validate().is_ok());
        assert_eq!(airspace.cooldown(), Duration::days(1));

        airspace.notification_cooldown_secs = 10_000_000_000_000_000;
        let err = airspace.validate().unwrap_err();
        assert!(err.contains("cooldown"), "{}", err);
        // An unvalidated value still yields a usable window
        assert_eq!(airspace.cooldown(), Duration::days(1));
    }

    #[test]
    fn test_quiet_hours_wrapping_midnight() {
        let quiet = QuietHours::default();
        let at = |h, m| Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap();

        assert!(quiet.contains(at(23, 0)));
        assert!(quiet.contains(at(2, 30)));
        assert!(!quiet.contains(at(6, 0)));
        assert!(!quiet.contains(at(12, 0)));
        assert!(!quiet.contains(at(22, 59)));
    }

    #[test]
    fn test_quiet_hours_offset_and_disabled() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        // 12:00 UTC is 23:00 at UTC+11
        let quiet = QuietHours {
            utc_offset_minutes: 11 * 60,
            ..QuietHours::default()
        };
        assert!(quiet.contains(at));

        let disabled = QuietHours {
            enabled: false,
            utc_offset_minutes: 11 * 60,
            ..QuietHours::default()
        };
        assert!(!disabled.contains(at));
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let airspace: AirspaceConfig = toml::from_str(
            r#"
            center_latitude = 42.47
            center_longitude = -71.29
            field_elevation_ft_msl = 133

            [quiet_hours]
            start = "22:30"
            end = "05:45"
            "#,
        )
        .unwrap();

        assert_eq!(airspace.radius_nm, 4.0);
        assert_eq!(airspace.ceiling_ft_agl, 2500.0);
        assert_eq!(airspace.alert_distances_nm, vec![10.0, 5.0, 2.0]);
        assert_eq!(airspace.notification_cooldown_secs, 60);
        assert!(airspace.quiet_hours.enabled);
        assert_eq!(
            airspace.quiet_hours.start,
            NaiveTime::from_hms_opt(22, 30, 0).unwrap()
        );
    }
}
