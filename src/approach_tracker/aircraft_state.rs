use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use super::cooldown::CooldownLedger;
use crate::airspace::AlertKey;

/// Where an aircraft is in its approach cycle
///
/// The fired set only exists while an approach is underway, so a tracking aircraft can
/// never carry stale alerts and a landed aircraft always remembers what it fired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ApproachPhase {
    /// No sample seen yet
    #[default]
    Unseen,
    /// Seen, no alert ring crossed since the last re-arm
    Tracking,
    /// Crossing alert rings inbound
    Approaching { fired: BTreeSet<AlertKey> },
    /// Landing inferred; sticky until re-arm
    Landed { fired: BTreeSet<AlertKey> },
}

impl ApproachPhase {
    pub fn name(&self) -> &'static str {
        match self {
            ApproachPhase::Unseen => "unseen",
            ApproachPhase::Tracking => "tracking",
            ApproachPhase::Approaching { .. } => "approaching",
            ApproachPhase::Landed { .. } => "landed",
        }
    }

    pub fn has_fired(&self, key: AlertKey) -> bool {
        match self {
            ApproachPhase::Approaching { fired } | ApproachPhase::Landed { fired } => {
                fired.contains(&key)
            }
            _ => false,
        }
    }

    pub fn has_fired_any(&self) -> bool {
        matches!(
            self,
            ApproachPhase::Approaching { .. } | ApproachPhase::Landed { .. }
        )
    }

    pub fn is_landed(&self) -> bool {
        matches!(self, ApproachPhase::Landed { .. })
    }

    /// Leave `Unseen` once the first sample has been processed
    pub fn mark_seen(&mut self) {
        if *self == ApproachPhase::Unseen {
            *self = ApproachPhase::Tracking;
        }
    }

    /// Record a crossed alert ring
    pub fn record_alert(&mut self, key: AlertKey) {
        match self {
            ApproachPhase::Approaching { fired } | ApproachPhase::Landed { fired } => {
                fired.insert(key);
            }
            ApproachPhase::Unseen | ApproachPhase::Tracking => {
                *self = ApproachPhase::Approaching {
                    fired: BTreeSet::from([key]),
                };
            }
        }
    }

    /// Record the landing ring crossing and move to `Landed`
    pub fn record_landing(&mut self, key: AlertKey) {
        let mut fired = match std::mem::take(self) {
            ApproachPhase::Approaching { fired } | ApproachPhase::Landed { fired } => fired,
            ApproachPhase::Unseen | ApproachPhase::Tracking => BTreeSet::new(),
        };
        fired.insert(key);
        *self = ApproachPhase::Landed { fired };
    }

    /// Forget the current approach
    pub fn rearm(&mut self) {
        *self = ApproachPhase::Tracking;
    }
}

/// Per-aircraft runtime state for one tenant
/// Lives only in memory and is discarded whenever the tenant's tracker is rebuilt
#[derive(Debug, Clone, Default)]
pub struct AircraftState {
    pub phase: ApproachPhase,

    /// Distance from the field center on the previous sample
    pub last_distance_nm: Option<f64>,

    /// Farthest distance seen since the last re-arm
    pub max_distance_nm: Option<f64>,

    pub in_airspace: bool,
    pub on_ground: bool,
    pub altitude_agl_ft: Option<f64>,
    pub altitude_msl_ft: Option<f64>,
    pub ground_speed_kts: Option<f64>,
    pub last_position: Option<(f64, f64)>,

    /// Observation time of the last processed sample
    pub last_update_time: Option<DateTime<Utc>>,

    pub cooldowns: CooldownLedger,
}

impl AircraftState {
    /// Closing on the field: nearer now than at the farthest point of this approach
    pub fn is_approaching(&self) -> bool {
        match (self.last_distance_nm, self.max_distance_nm) {
            (Some(last), Some(max)) => last < max,
            _ => false,
        }
    }

    pub fn status(&self) -> AircraftStatus {
        if self.in_airspace {
            AircraftStatus::InAirspace
        } else if self.on_ground {
            AircraftStatus::OnGround
        } else {
            AircraftStatus::Outside
        }
    }

    /// Build the read-only view of this aircraft
    /// Returns None until at least one sample has been processed
    pub fn to_live(&self, icao24: &str, tail_number: &str) -> Option<LiveAircraft> {
        let last_seen = self.last_update_time?;
        Some(LiveAircraft {
            tail_number: tail_number.to_string(),
            icao24: icao24.to_string(),
            status: self.status(),
            phase: self.phase.name(),
            distance_nm: self.last_distance_nm.unwrap_or_default(),
            altitude_ft_agl: self.altitude_agl_ft,
            altitude_ft_msl: self.altitude_msl_ft,
            velocity_kts: self.ground_speed_kts,
            is_approaching: self.is_approaching(),
            last_seen,
            latitude: self.last_position.map(|(lat, _)| lat),
            longitude: self.last_position.map(|(_, lon)| lon),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AircraftStatus {
    InAirspace,
    OnGround,
    Outside,
}

/// Live status of one tracked aircraft, for status display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveAircraft {
    pub tail_number: String,
    pub icao24: String,
    pub status: AircraftStatus,
    pub phase: &'static str,
    pub distance_nm: f64,
    pub altitude_ft_agl: Option<f64>,
    pub altitude_ft_msl: Option<f64>,
    pub velocity_kts: Option<f64>,
    pub is_approaching: bool,
    pub last_seen: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_progression() {
        let ten = AlertKey::from_nm(10.0);
        let five = AlertKey::from_nm(5.0);
        let two = AlertKey::from_nm(2.0);

        let mut phase = ApproachPhase::default();
        assert_eq!(phase.name(), "unseen");

        phase.mark_seen();
        assert_eq!(phase, ApproachPhase::Tracking);
        assert!(!phase.has_fired(ten));

        phase.record_alert(ten);
        phase.record_alert(five);
        assert_eq!(phase.name(), "approaching");
        assert!(phase.has_fired(ten) && phase.has_fired(five));

        phase.record_landing(two);
        assert!(phase.is_landed());
        assert!(phase.has_fired(two));
        assert!(phase.has_fired(ten));

        // mark_seen never regresses a later phase
        phase.mark_seen();
        assert!(phase.is_landed());

        phase.rearm();
        assert_eq!(phase, ApproachPhase::Tracking);
        assert!(!phase.has_fired(ten));
    }

    #[test]
    fn test_is_approaching() {
        let mut state = AircraftState::default();
        assert!(!state.is_approaching());

        state.last_distance_nm = Some(8.0);
        state.max_distance_nm = Some(11.0);
        assert!(state.is_approaching());

        state.last_distance_nm = Some(11.0);
        assert!(!state.is_approaching());
    }

    #[test]
    fn test_live_view_requires_a_sample() {
        let mut state = AircraftState::default();
        assert!(state.to_live("a1b2c3", "N123AB").is_none());

        state.last_update_time = Some(Utc::now());
        state.last_distance_nm = Some(3.2);
        state.on_ground = true;
        let live = state.to_live("a1b2c3", "N123AB").unwrap();
        assert_eq!(live.status, AircraftStatus::OnGround);
        assert_eq!(live.distance_nm, 3.2);
        assert_eq!(live.phase, "unseen");
    }
}
