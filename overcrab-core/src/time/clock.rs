use super::*;

/// Source of the current processing time.
///
/// Operators read the clock once per record and thread the value through the
/// rest of that record's processing.
pub trait ProcessingTimeService: Send {
    /// Current wall-clock time in milliseconds since epoch.
    fn current_processing_time(&self) -> ProcessingTime;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ProcessingTimeService for SystemClock {
    fn current_processing_time(&self) -> ProcessingTime {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as ProcessingTime)
            .unwrap_or(0)
    }
}

/// Manually driven clock for tests and replays.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// hand another to the operator.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: ProcessingTime) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn set(&self, time: ProcessingTime) {
        self.now.store(time, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(duration_millis(by), Ordering::SeqCst);
    }
}

impl ProcessingTimeService for ManualClock {
    fn current_processing_time(&self) -> ProcessingTime {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a [`Duration`] to whole milliseconds, saturating at `i64::MAX`.
pub fn duration_millis(duration: Duration) -> ProcessingTime {
    ProcessingTime::try_from(duration.as_millis()).unwrap_or(ProcessingTime::MAX)
}
