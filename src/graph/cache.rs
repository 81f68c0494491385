// Snapshot freshness cache with an injectable clock
//
// Bursts of snapshot requests inside one operation cycle share a single
// dump. The cache is keyed only by wall-clock recency, so writers must
// invalidate it or bypass it when stale data could cause harm.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::snapshot::Snapshot;

/// Source of "now" for freshness decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Holds the most recent snapshot together with the instant it was taken
pub struct SnapshotCache {
    clock: Arc<dyn Clock>,
    window: Duration,
    entry: Option<(Instant, Arc<Snapshot>)>,
}

impl SnapshotCache {
    pub fn new(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            clock,
            window,
            entry: None,
        }
    }

    /// Cached snapshot if it is younger than the freshness window
    pub fn get(&self) -> Option<Arc<Snapshot>> {
        let (taken_at, snapshot) = self.entry.as_ref()?;
        let age = self.clock.now().saturating_duration_since(*taken_at);
        if age < self.window {
            crate::route_debug!("Using cached snapshot (age: {:?})", age);
            Some(snapshot.clone())
        } else {
            None
        }
    }

    pub fn store(&mut self, snapshot: Arc<Snapshot>) {
        self.entry = Some((self.clock.now(), snapshot));
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("window", &self.window)
            .field("populated", &self.entry.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_expires_with_clock() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = SnapshotCache::new(clock.clone(), Duration::from_secs(2));
        assert!(cache.get().is_none());

        cache.store(Arc::new(Snapshot::default()));
        assert!(cache.get().is_some());

        clock.advance(Duration::from_millis(1999));
        assert!(cache.get().is_some());

        clock.advance(Duration::from_millis(1));
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_invalidate_drops_entry() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = SnapshotCache::new(clock, Duration::from_secs(60));
        cache.store(Arc::new(Snapshot::default()));
        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
