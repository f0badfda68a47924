//! Failure cooldown: keys that recently failed are muted for a window so
//! a pass does not re-log the same broken item every cycle. Owned by the
//! invoking process, lifetime tied to process start; the clock is
//! injectable so tests control time.

use crate::curator::util::now_epoch_secs;
use std::collections::BTreeMap;

pub trait Clock {
    fn now_epoch_secs(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        now_epoch_secs().unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct CooldownMap<C: Clock = SystemClock> {
    window_secs: u64,
    entries: BTreeMap<String, u64>,
    clock: C,
}

impl CooldownMap<SystemClock> {
    pub fn new(window_secs: u64) -> Self {
        Self::with_clock(window_secs, SystemClock)
    }
}

impl<C: Clock> CooldownMap<C> {
    pub fn with_clock(window_secs: u64, clock: C) -> Self {
        Self {
            window_secs,
            entries: BTreeMap::new(),
            clock,
        }
    }

    pub fn record_failure(&mut self, key: &str) {
        self.entries
            .insert(key.to_string(), self.clock.now_epoch_secs());
    }

    pub fn is_cooling(&self, key: &str) -> bool {
        match self.entries.get(key) {
            None => false,
            Some(&failed_at) => {
                self.clock.now_epoch_secs().saturating_sub(failed_at) < self.window_secs
            }
        }
    }

    /// Drop entries whose window has elapsed; keeps the map bounded on
    /// long-running processes.
    pub fn prune_expired(&mut self) {
        let now = self.clock.now_epoch_secs();
        self.entries
            .retain(|_, &mut failed_at| now.saturating_sub(failed_at) < self.window_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct ManualClock(Rc<Cell<u64>>);

    impl Clock for ManualClock {
        fn now_epoch_secs(&self) -> u64 {
            self.0.get()
        }
    }

    #[test]
    fn key_cools_until_window_elapses() {
        let now = Rc::new(Cell::new(1_000));
        let mut map = CooldownMap::with_clock(60, ManualClock(now.clone()));

        map.record_failure("intake/BROKEN-001");
        assert!(map.is_cooling("intake/BROKEN-001"));
        assert!(!map.is_cooling("intake/other"));

        now.set(1_059);
        assert!(map.is_cooling("intake/BROKEN-001"));

        now.set(1_060);
        assert!(!map.is_cooling("intake/BROKEN-001"));
    }

    #[test]
    fn prune_drops_expired_entries_only() {
        let now = Rc::new(Cell::new(0));
        let mut map = CooldownMap::with_clock(60, ManualClock(now.clone()));

        map.record_failure("old");
        now.set(30);
        map.record_failure("fresh");
        now.set(70);

        map.prune_expired();
        assert!(!map.is_cooling("old"));
        assert!(map.is_cooling("fresh"));
    }
}
