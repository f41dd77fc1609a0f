use super::*;

/// Schedules per-key cleanup timers that bound the memory held by idle keys.
///
/// On every row the manager makes sure a cleanup timer exists that fires no
/// earlier than `now + min_retention` and no later than `now + max_retention`.
/// A new timer is only registered when the existing one would fire too early,
/// so a busy key re-registers at most once per `max - min` interval.
///
/// The live cleanup time is kept in keyed value state; a timer whose fire time
/// no longer matches it is stale and ignored.
#[derive(Debug, Clone)]
pub struct RetentionTimerManager {
    min_retention: ProcessingTime,
    max_retention: ProcessingTime,
    cleanup_time: ValueStateHandle<ProcessingTime>,
}

impl RetentionTimerManager {
    pub fn new(config: &RetentionConfig) -> Self {
        Self {
            min_retention: duration_millis(config.min),
            max_retention: duration_millis(config.max),
            cleanup_time: ValueStateHandle::new("retention-cleanup-time"),
        }
    }

    /// Retention is off when the maximum retention is zero.
    pub fn is_enabled(&self) -> bool {
        self.max_retention > 0
    }

    /// Register or refresh the cleanup timer for the backend's current key.
    ///
    /// Returns the newly scheduled cleanup time, or `None` when the existing
    /// timer still satisfies the minimum retention (or retention is disabled).
    pub fn register<B: KeyedStateBackend>(
        &self,
        backend: &mut B,
        timers: &mut TimerService,
        now: ProcessingTime,
    ) -> Result<Option<ProcessingTime>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let current = self.cleanup_time.get(backend)?;
        let needs_refresh = match current {
            None => true,
            Some(scheduled) => now.saturating_add(self.min_retention) > scheduled,
        };
        if !needs_refresh {
            return Ok(None);
        }

        let key_bytes = backend
            .current_key()
            .ok_or_else(|| anyhow!("cannot register a cleanup timer without a current key"))?
            .to_vec();
        let cleanup_at = now.saturating_add(self.max_retention);
        if let Some(previous) = current {
            timers.delete(&key_bytes, previous);
        }
        timers.register(key_bytes, cleanup_at);
        self.cleanup_time.put(backend, cleanup_at)?;
        debug!(now, cleanup_at, "scheduled retention cleanup");
        Ok(Some(cleanup_at))
    }

    /// Handle a fired timer for the backend's current key.
    ///
    /// Returns `true` when `fire_at` is the key's live cleanup time, in which
    /// case the cleanup-time state has been cleared and the caller must purge
    /// the key's remaining state.
    pub fn on_timer<B: KeyedStateBackend>(
        &self,
        backend: &mut B,
        fire_at: ProcessingTime,
    ) -> Result<bool> {
        match self.cleanup_time.get(backend)? {
            Some(scheduled) if scheduled == fire_at => {
                self.cleanup_time.clear(backend)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
