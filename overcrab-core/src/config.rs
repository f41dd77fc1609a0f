//! Operator configuration.

use std::time::Duration;

use anyhow::{bail, Result};

/// Idle-key state retention bounds.
///
/// A key that receives no rows is purged somewhere between `min` and `max`
/// after its last row. `max == 0` disables retention entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    pub min: Duration,
    pub max: Duration,
}

impl RetentionConfig {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Keep state forever.
    pub fn disabled() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.max.is_zero()
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(60 * 60),
            max: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// Configuration of a processing-time `ROWS BETWEEN n PRECEDING AND CURRENT ROW` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverWindowConfig {
    /// Number of rows preceding the current one that belong to its window.
    pub lower_boundary: u64,
    pub retention: RetentionConfig,
}

impl OverWindowConfig {
    pub fn new(lower_boundary: u64) -> Self {
        Self {
            lower_boundary,
            retention: RetentionConfig::default(),
        }
    }

    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    /// Number of rows in a full window, current row included.
    pub fn window_size(&self) -> usize {
        usize::try_from(self.lower_boundary)
            .unwrap_or(usize::MAX)
            .saturating_add(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention.max < self.retention.min {
            bail!(
                "max retention ({:?}) must not be smaller than min retention ({:?})",
                self.retention.max,
                self.retention.min
            );
        }
        Ok(())
    }
}

/// Parse durations like `"10s"`, `"500ms"`, `"2m"`, `"1h"`; a bare number means seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if let Some(num) = s.strip_suffix("ms") {
        return Ok(Duration::from_millis(num.trim().parse()?));
    }
    if let Some(num) = s.strip_suffix('s') {
        return Ok(Duration::from_secs(num.trim().parse()?));
    }
    if let Some(num) = s.strip_suffix('m') {
        return Ok(Duration::from_secs(num.trim().parse::<u64>()? * 60));
    }
    if let Some(num) = s.strip_suffix('h') {
        return Ok(Duration::from_secs(num.trim().parse::<u64>()? * 3_600));
    }
    Ok(Duration::from_secs(s.parse()?))
}
