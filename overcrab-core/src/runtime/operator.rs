//! Operator contract driven by the task loop.

use crate::types::ProcessingTime;
use anyhow::Result;

/// A batch-oriented, push-based stream operator.
///
/// - **Associated type OUT**: each `Operator<IN>` has exactly one output type.
/// - **Batch input**: `&[IN]` instead of a single record.
/// - **Push output**: results are appended to a caller-owned buffer that is
///   reused across batches (the caller clears it).
///
/// All callbacks of one instance run on one thread, one at a time.
pub trait Operator<IN>: Send {
    /// Output type of this operator.
    type OUT: Send;

    /// Process a batch of input records, pushing outputs to the provided buffer.
    fn process_batch(&mut self, input: &[IN], output: &mut Vec<Self::OUT>) -> Result<()>;

    /// Processing-time callback, invoked by the task when its tick elapses.
    ///
    /// Default implementation is a no-op.
    fn on_processing_time(
        &mut self,
        _processing_time: ProcessingTime,
        _output: &mut Vec<Self::OUT>,
    ) -> Result<()> {
        Ok(())
    }

    /// Snapshot operator state into bytes.
    ///
    /// Stateless operators can keep the default empty snapshot.
    fn snapshot_state(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Restore operator state from bytes.
    ///
    /// Stateless operators can keep the default no-op implementation.
    fn restore_state(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}
