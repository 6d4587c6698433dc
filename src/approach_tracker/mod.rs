mod aircraft_state;
mod cooldown;
mod zone_crossing;

pub use aircraft_state::{AircraftState, AircraftStatus, ApproachPhase, LiveAircraft};
pub use cooldown::CooldownLedger;
pub use zone_crossing::{
    CLOSURE_SPEED_NM_PER_MIN, LANDING_PREREQUISITE_RINGS_NM, LANDING_RING_NM, REARM_DISTANCE_NM,
    eta_minutes,
};

use metrics::counter;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::airspace::{AirspaceConfig, AlertDistance};
use crate::events::{NotificationEvent, TenantEvents};
use crate::position::PositionSample;
use crate::tenant::{AircraftSet, TenantId};

/// Approach tracking for one tenant
///
/// Owns the tenant's airspace, its tracked aircraft and one runtime state per aircraft that
/// has produced at least one usable sample. Not internally synchronized: the scheduler wraps
/// each tracker in its own mutex so rebuilds, ingests and snapshots never interleave.
#[derive(Debug)]
pub struct TenantTracker {
    tenant_id: TenantId,
    airspace: AirspaceConfig,
    alert_distances: Vec<AlertDistance>,
    aircraft: AircraftSet,
    // Keyed by lowercase icao24; only ever holds members of `aircraft`
    states: HashMap<String, AircraftState>,
}

impl TenantTracker {
    pub fn new(tenant_id: TenantId, airspace: AirspaceConfig, aircraft: AircraftSet) -> Self {
        let alert_distances = airspace.sorted_alert_distances();
        Self {
            tenant_id,
            airspace,
            alert_distances,
            aircraft,
            states: HashMap::new(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn airspace(&self) -> &AirspaceConfig {
        &self.airspace
    }

    pub fn aircraft(&self) -> &AircraftSet {
        &self.aircraft
    }

    /// Number of aircraft with runtime state
    pub fn tracked_state_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, icao24: &str) -> Option<&AircraftState> {
        self.states.get(icao24)
    }

    /// Replace configuration and aircraft set, discarding all runtime state
    pub fn rebuild(&mut self, airspace: AirspaceConfig, aircraft: AircraftSet) {
        debug!(
            tenant_id = %self.tenant_id,
            aircraft = aircraft.len(),
            discarded_states = self.states.len(),
            "Rebuilding tenant tracker"
        );
        self.alert_distances = airspace.sorted_alert_distances();
        self.airspace = airspace;
        self.aircraft = aircraft;
        self.states.clear();
    }

    /// Route a batch of feed samples through the per-aircraft state machines
    ///
    /// Samples for untracked aircraft are ignored. Samples without a position are skipped
    /// without touching state.
    pub fn ingest_feed_batch(&mut self, samples: &[PositionSample]) -> TenantEvents {
        let mut events = Vec::new();
        for sample in samples {
            events.extend(self.ingest_sample(sample));
        }
        TenantEvents {
            tenant_id: self.tenant_id,
            events,
        }
    }

    /// Process one sample, returning the events it produced
    pub fn ingest_sample(&mut self, sample: &PositionSample) -> Vec<NotificationEvent> {
        let icao24 = sample.icao24.trim().to_ascii_lowercase();
        let Some(label) = self.aircraft.label(&icao24) else {
            return Vec::new();
        };

        let Some((latitude, longitude)) = sample.position() else {
            trace!(tenant_id = %self.tenant_id, icao24 = %icao24, "Skipping sample without position");
            counter!("tracker.samples_skipped_total").increment(1);
            return Vec::new();
        };

        counter!("tracker.samples_ingested_total").increment(1);

        let state = self.states.entry(icao24).or_default();
        let events = zone_crossing::process_sample(
            state,
            sample,
            latitude,
            longitude,
            label,
            &self.airspace,
            &self.alert_distances,
        );

        if !events.is_empty() {
            counter!("tracker.events_emitted_total").increment(events.len() as u64);
        }
        events
    }

    /// Live view of every tracked aircraft with recorded state, nearest first
    pub fn snapshot(&self) -> Vec<LiveAircraft> {
        let mut live: Vec<LiveAircraft> = self
            .aircraft
            .iter()
            .filter_map(|(icao24, tail)| self.states.get(icao24)?.to_live(icao24, tail))
            .collect();
        live.sort_by(|a, b| a.distance_nm.total_cmp(&b.distance_nm));
        live
    }
}
