use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::events::EventKind;

/// Last-fired timestamps per event kind for one aircraft
///
/// Independent of the per-approach fired set: an approach that re-arms still has to wait
/// out the cooldown before the same kind can be sent again.
#[derive(Debug, Clone, Default)]
pub struct CooldownLedger {
    last_fired: HashMap<EventKind, DateTime<Utc>>,
}

impl CooldownLedger {
    /// Claim the right to send `kind` at `now`
    ///
    /// Returns false while the previous send of the same kind is still within `window`.
    /// Recorded timestamps never move backwards.
    pub fn try_acquire(&mut self, kind: EventKind, now: DateTime<Utc>, window: Duration) -> bool {
        if let Some(last) = self.last_fired.get(&kind)
            && now.signed_duration_since(*last) < window
        {
            return false;
        }

        let entry = self.last_fired.entry(kind).or_insert(now);
        *entry = (*entry).max(now);
        true
    }

    pub fn last_fired(&self, kind: EventKind) -> Option<DateTime<Utc>> {
        self.last_fired.get(&kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cooldown_window() {
        let mut ledger = CooldownLedger::default();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let window = Duration::minutes(1);

        assert!(ledger.try_acquire(EventKind::Landing, t0, window));
        assert!(!ledger.try_acquire(EventKind::Landing, t0 + Duration::seconds(30), window));
        assert!(ledger.try_acquire(EventKind::Landing, t0 + Duration::seconds(60), window));
        assert_eq!(
            ledger.last_fired(EventKind::Landing),
            Some(t0 + Duration::seconds(60))
        );
    }

    #[test]
    fn test_kinds_are_independent() {
        use crate::airspace::AlertKey;

        let mut ledger = CooldownLedger::default();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let window = Duration::minutes(1);

        assert!(ledger.try_acquire(EventKind::Distance(AlertKey::from_nm(10.0)), t0, window));
        assert!(ledger.try_acquire(EventKind::Distance(AlertKey::from_nm(5.0)), t0, window));
        assert!(ledger.try_acquire(EventKind::Landing, t0, window));
    }

    #[test]
    fn test_clock_going_backwards_is_suppressed() {
        let mut ledger = CooldownLedger::default();
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let window = Duration::minutes(1);

        assert!(ledger.try_acquire(EventKind::Landing, t0, window));
        assert!(!ledger.try_acquire(EventKind::Landing, t0 - Duration::hours(1), window));
        assert_eq!(ledger.last_fired(EventKind::Landing), Some(t0));
    }
}
