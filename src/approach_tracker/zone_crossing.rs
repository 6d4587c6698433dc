//! Zone-crossing detection
//!
//! Turns one position sample into zero or more notification events. An alert ring fires
//! when the aircraft crosses it inbound after having been seen beyond it, once per
//! approach. Crossing the 2 nm ring after both the 10 nm and 5 nm rings fired is taken as
//! a landing. Once the aircraft is seen beyond the re-arm distance the approach is
//! forgotten and a new one can start.

use metrics::counter;
use tracing::{debug, trace};

use super::aircraft_state::AircraftState;
use crate::airspace::{AirspaceConfig, AlertDistance, AlertKey, check_sample_against_airspace};
use crate::events::{EventKind, NotificationEvent};
use crate::geometry::altitude_msl_ft;
use crate::position::PositionSample;

/// Beyond this distance an aircraft's approach bookkeeping is cleared
pub const REARM_DISTANCE_NM: f64 = 12.0;

/// Assumed closure speed for ETA estimates
pub const CLOSURE_SPEED_NM_PER_MIN: f64 = 1.5;

/// Alert ring that doubles as the landing trigger
pub const LANDING_RING_NM: f64 = 2.0;

/// Rings that must have fired before the landing ring counts as a landing
pub const LANDING_PREREQUISITE_RINGS_NM: [f64; 2] = [10.0, 5.0];

/// Minutes to arrival at the fixed closure speed
pub fn eta_minutes(distance_nm: f64) -> u32 {
    (distance_nm / CLOSURE_SPEED_NM_PER_MIN).floor().max(0.0) as u32
}

fn landing_sequence_complete(state: &AircraftState) -> bool {
    LANDING_PREREQUISITE_RINGS_NM
        .iter()
        .all(|nm| state.phase.has_fired(AlertKey::from_nm(*nm)))
}

/// Process one sample with a known position for one aircraft
///
/// `alert_distances` must be sorted farthest first (see `AirspaceConfig::sorted_alert_distances`).
pub(crate) fn process_sample(
    state: &mut AircraftState,
    sample: &PositionSample,
    latitude: f64,
    longitude: f64,
    label: &str,
    airspace: &AirspaceConfig,
    alert_distances: &[AlertDistance],
) -> Vec<NotificationEvent> {
    let check = check_sample_against_airspace(sample, latitude, longitude, airspace);
    let distance_nm = check.distance_nm;
    let now = sample.observed_at;
    let cooldown = airspace.cooldown();

    let mut max_distance_nm = match state.max_distance_nm {
        Some(max) if max >= distance_nm => max,
        _ => distance_nm,
    };

    let mut events = Vec::new();

    if !sample.on_ground
        && let Some(previous_nm) = state.last_distance_nm
    {
        let landing_key = AlertKey::from_nm(LANDING_RING_NM);

        for ring in alert_distances {
            let boundary = ring.distance_nm;
            let crossed = previous_nm > boundary && distance_nm <= boundary;
            let came_from_beyond = max_distance_nm > boundary;

            if !crossed || !came_from_beyond || state.phase.has_fired(ring.key) {
                continue;
            }

            if ring.key == landing_key && landing_sequence_complete(state) {
                if state.phase.is_landed() {
                    continue;
                }
                state.phase.record_landing(ring.key);

                if state.cooldowns.try_acquire(EventKind::Landing, now, cooldown) {
                    debug!(icao24 = %sample.icao24, label, distance_nm, "Landing inferred");
                    events.push(NotificationEvent {
                        kind: EventKind::Landing,
                        icao24: sample.icao24.clone(),
                        label: label.to_string(),
                        distance_nm,
                        altitude_agl_ft: check.altitude_agl_ft,
                        eta_minutes: None,
                        timestamp: now,
                    });
                } else {
                    counter!("tracker.events_suppressed_cooldown_total").increment(1);
                }
            } else {
                state.phase.record_alert(ring.key);

                let kind = EventKind::Distance(ring.key);
                if state.cooldowns.try_acquire(kind, now, cooldown) {
                    debug!(icao24 = %sample.icao24, label, ring = %ring.key, distance_nm, "Alert ring crossed");
                    events.push(NotificationEvent {
                        kind,
                        icao24: sample.icao24.clone(),
                        label: label.to_string(),
                        distance_nm,
                        altitude_agl_ft: check.altitude_agl_ft,
                        eta_minutes: Some(eta_minutes(distance_nm)),
                        timestamp: now,
                    });
                } else {
                    counter!("tracker.events_suppressed_cooldown_total").increment(1);
                }
            }
        }
    }

    if distance_nm > REARM_DISTANCE_NM {
        if state.phase.has_fired_any() {
            trace!(icao24 = %sample.icao24, distance_nm, "Re-arming approach alerts");
        }
        state.phase.rearm();
        max_distance_nm = distance_nm;
    }

    state.phase.mark_seen();
    state.last_distance_nm = Some(distance_nm);
    state.max_distance_nm = Some(max_distance_nm);
    state.in_airspace = check.contained();
    state.on_ground = sample.on_ground;
    state.altitude_agl_ft = check.altitude_agl_ft;
    state.altitude_msl_ft = altitude_msl_ft(sample.baro_altitude_m);
    state.ground_speed_kts = sample.ground_speed_kts;
    state.last_position = Some((latitude, longitude));
    state.last_update_time = Some(now);

    events
}
