use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::METERS_TO_FEET;

/// A single position report for one aircraft, as handed to the trackers
/// This is agnostic to the feed it came from: the feed client maps its wire format onto it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// ICAO 24-bit address, lowercase hex
    pub icao24: String,

    /// Aircraft position (absent when the feed has no recent position)
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// Barometric altitude in meters, None when on ground or unknown
    pub baro_altitude_m: Option<f64>,
    pub on_ground: bool,

    pub ground_speed_kts: Option<f64>,

    /// When the feed observed this position
    pub observed_at: DateTime<Utc>,
}

impl PositionSample {
    /// Position as a (lat, lon) pair, if both coordinates are present
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Unit the feed reports barometric altitude in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AltitudeUnit {
    #[default]
    Meters,
    Feet,
}

impl AltitudeUnit {
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            AltitudeUnit::Meters => value,
            AltitudeUnit::Feet => value / METERS_TO_FEET,
        }
    }
}

/// Position feed response body
#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub ac: Vec<FeedAircraft>,
    /// Server time in milliseconds since the epoch
    pub now: Option<f64>,
}

/// Barometric altitude as reported by the feed: a number, or the literal "ground"
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BaroAltitude {
    Value(f64),
    Text(String),
}

/// Single aircraft entry from the feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeedAircraft {
    #[serde(default)]
    pub hex: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt_baro: Option<BaroAltitude>,
    pub gs: Option<f64>,
}

impl FeedAircraft {
    /// Normalized identifier used to match tracked aircraft
    pub fn icao24(&self) -> String {
        self.hex.trim().to_ascii_lowercase()
    }

    pub fn into_sample(self, observed_at: DateTime<Utc>, unit: AltitudeUnit) -> PositionSample {
        let on_ground = matches!(&self.alt_baro, Some(BaroAltitude::Text(t)) if t.eq_ignore_ascii_case("ground"));
        let baro_altitude_m = match self.alt_baro {
            Some(BaroAltitude::Value(v)) => Some(unit.to_meters(v)),
            _ => None,
        };

        PositionSample {
            icao24: self.icao24(),
            latitude: self.lat,
            longitude: self.lon,
            baro_altitude_m,
            on_ground,
            ground_speed_kts: self.gs,
            observed_at,
        }
    }
}

impl FeedResponse {
    /// Timestamp of the response, falling back to the supplied fetch time
    pub fn observed_at(&self, fetched_at: DateTime<Utc>) -> DateTime<Utc> {
        self.now
            .and_then(|ms| Utc.timestamp_millis_opt(ms as i64).single())
            .unwrap_or(fetched_at)
    }

    pub fn into_samples(self, fetched_at: DateTime<Utc>, unit: AltitudeUnit) -> Vec<PositionSample> {
        let observed_at = self.observed_at(fetched_at);
        self.ac
            .into_iter()
            .filter(|a| !a.hex.trim().is_empty())
            .map(|a| a.into_sample(observed_at, unit))
            .collect()
    }
}
