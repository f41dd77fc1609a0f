use super::*;

/// Manages processing-time timers for a single operator instance.
///
/// Timers are sorted by fire time in a `BTreeMap`, enabling O(log n) range scans.
///
/// # Invariant
/// A `(key_bytes, fire_at)` pair is registered at most once; re-registering
/// the same pair is idempotent.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TimerService {
    /// Sorted map: fire_at -> set of serialized key bytes registered at that time.
    timers: BTreeMap<ProcessingTime, BTreeSet<Vec<u8>>>,
}

impl TimerService {
    /// Create an empty `TimerService`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer for `key_bytes` to fire at `fire_at`.
    ///
    /// Re-registering the same `(key_bytes, fire_at)` pair is idempotent.
    pub fn register(&mut self, key_bytes: Vec<u8>, fire_at: ProcessingTime) {
        self.timers.entry(fire_at).or_default().insert(key_bytes);
    }

    /// Cancel a timer.
    ///
    /// No-op if the `(key_bytes, fire_at)` pair was not registered.
    pub fn delete(&mut self, key_bytes: &[u8], fire_at: ProcessingTime) {
        if let Some(keys) = self.timers.get_mut(&fire_at) {
            keys.remove(key_bytes);
            if keys.is_empty() {
                self.timers.remove(&fire_at);
            }
        }
    }

    /// Drain and return all timers with `fire_at <= now`.
    ///
    /// The returned vector contains `(key_bytes, fire_at)` pairs in ascending
    /// `fire_at` order.
    pub fn drain_due(&mut self, now: ProcessingTime) -> Vec<(Vec<u8>, ProcessingTime)> {
        let fire_times: Vec<ProcessingTime> =
            self.timers.range(..=now).map(|(ts, _)| *ts).collect();

        let mut fired = Vec::new();
        for fire_at in fire_times {
            if let Some(keys) = self.timers.remove(&fire_at) {
                for key in keys {
                    fired.push((key, fire_at));
                }
            }
        }
        fired
    }

    /// Return the timestamp of the earliest pending timer, or `None`.
    pub fn next_timer(&self) -> Option<ProcessingTime> {
        self.timers.keys().next().copied()
    }

    /// Whether `key_bytes` has a timer registered at `fire_at`.
    pub fn contains(&self, key_bytes: &[u8], fire_at: ProcessingTime) -> bool {
        self.timers
            .get(&fire_at)
            .is_some_and(|keys| keys.contains(key_bytes))
    }

    /// Return the total count of registered `(key, fire_at)` pairs.
    pub fn len(&self) -> usize {
        self.timers.values().map(|keys| keys.len()).sum()
    }

    /// Return `true` if no timers are registered.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
