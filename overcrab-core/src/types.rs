use serde::{Deserialize, Serialize};

/// Processing time in milliseconds since epoch.
pub type ProcessingTime = i64;

/// Unique identifier for checkpoint barriers.
pub type CheckpointId = u64;

/// Checkpoint barrier flowing in-band with the records of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Barrier {
    pub checkpoint_id: CheckpointId,
    pub timestamp: ProcessingTime,
}

impl Barrier {
    /// Create a new checkpoint barrier with the given ID.
    pub fn new(checkpoint_id: CheckpointId) -> Self {
        Self {
            checkpoint_id,
            timestamp: 0,
        }
    }

    /// Create a new checkpoint barrier with explicit timestamp.
    pub fn with_timestamp(checkpoint_id: CheckpointId, timestamp: ProcessingTime) -> Self {
        Self {
            checkpoint_id,
            timestamp,
        }
    }
}

/// The unit flowing into a task: data records, checkpoint barriers and the end marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum StreamElement<T> {
    /// User data record.
    Record(T),
    /// Checkpoint barrier for state snapshots.
    CheckpointBarrier(Barrier),
    /// End of bounded stream.
    End,
}

impl<T> StreamElement<T> {
    /// Create a record element.
    pub fn record(value: T) -> Self {
        Self::Record(value)
    }

    /// Create a checkpoint barrier element.
    pub fn barrier(checkpoint_id: CheckpointId) -> Self {
        Self::CheckpointBarrier(Barrier::new(checkpoint_id))
    }
}

/// An input row emitted together with the aggregate computed over its window.
///
/// The input is forwarded untouched; the aggregate is whatever the executor returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinedRow<IN, ACC> {
    pub input: IN,
    pub aggregate: ACC,
}

impl<IN, ACC> JoinedRow<IN, ACC> {
    pub fn new(input: IN, aggregate: ACC) -> Self {
        Self { input, aggregate }
    }
}

impl<IN: std::fmt::Display, ACC: std::fmt::Display> std::fmt::Display for JoinedRow<IN, ACC> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.input, self.aggregate)
    }
}

/// Trait bound for types that can flow through the stream.
/// All user data types must satisfy this.
pub trait StreamData: Send + Clone + Serialize + for<'de> Deserialize<'de> + 'static {}

// Blanket implementation: any type satisfying the bounds is StreamData.
impl<T> StreamData for T where T: Send + Clone + Serialize + for<'de> Deserialize<'de> + 'static {}

#[cfg(test)]
#[path = "tests/types_tests.rs"]
mod tests;
