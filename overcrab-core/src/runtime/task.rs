//! Task execution model for parallel stream processing.
//!
//! - Single-threaded Task (event loop per Task instance)
//! - Multi-instance parallelism (one Task per thread)
//! - Each Task owns its operator and, through it, its state backend and timers
//!
//! # Task Execution Loop
//!
//! ```text
//! loop {
//!     element = input.recv()          // or tick timeout
//!     match element {
//!         <tick>  => operator.on_processing_time(now) -> emit
//!         Record  => operator.process_batch([rec]) -> emit
//!         Barrier => snapshot_state() -> ack -> forward barrier
//!         End     => forward End -> break
//!     }
//! }
//! ```

use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info};

use crate::time::{ProcessingTimeService, SystemClock};
use crate::types::{Barrier, CheckpointId, StreamElement};

use super::Operator;

/// State snapshot a task took when a checkpoint barrier passed through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCheckpointAck {
    pub checkpoint_id: CheckpointId,
    pub subtask_index: usize,
    pub state: Vec<u8>,
}

/// One subtask: drives a single operator instance from an input channel.
pub struct Task<IN, Op, C = SystemClock>
where
    Op: Operator<IN>,
{
    subtask_index: usize,
    input: Receiver<StreamElement<IN>>,
    output: Sender<StreamElement<Op::OUT>>,
    operator: Op,
    clock: C,
    /// Optional processing-time tick interval.
    processing_time_tick_interval: Option<Duration>,
    /// Optional checkpoint ack sender.
    checkpoint_sender: Option<Sender<TaskCheckpointAck>>,
    _phantom: PhantomData<fn(IN)>,
}

impl<IN, Op> Task<IN, Op>
where
    Op: Operator<IN>,
{
    /// Create a task reading processing time from the system clock.
    pub fn new(
        subtask_index: usize,
        input: Receiver<StreamElement<IN>>,
        output: Sender<StreamElement<Op::OUT>>,
        operator: Op,
    ) -> Self {
        Self::with_clock(subtask_index, input, output, operator, SystemClock)
    }
}

impl<IN, Op, C> Task<IN, Op, C>
where
    Op: Operator<IN>,
    C: ProcessingTimeService,
{
    pub fn with_clock(
        subtask_index: usize,
        input: Receiver<StreamElement<IN>>,
        output: Sender<StreamElement<Op::OUT>>,
        operator: Op,
        clock: C,
    ) -> Self {
        Self {
            subtask_index,
            input,
            output,
            operator,
            clock,
            processing_time_tick_interval: None,
            checkpoint_sender: None,
            _phantom: PhantomData,
        }
    }

    /// Enable processing-time ticks for this task.
    pub fn with_processing_time_tick(mut self, interval: Duration) -> Self {
        self.processing_time_tick_interval = Some(interval);
        self
    }

    /// Report a state snapshot on `sender` for every checkpoint barrier.
    pub fn with_checkpointing(mut self, sender: Sender<TaskCheckpointAck>) -> Self {
        self.checkpoint_sender = Some(sender);
        self
    }

    pub fn subtask_index(&self) -> usize {
        self.subtask_index
    }

    pub fn operator(&self) -> &Op {
        &self.operator
    }

    /// Restore the operator from a snapshot taken by a previous run.
    pub fn restore(&mut self, state: &[u8]) -> Result<()> {
        self.operator.restore_state(state)
    }

    /// Run the task event loop.
    ///
    /// Returns after `End` has been forwarded, or when the input channel
    /// disconnects. An operator error stops the task and is returned as is.
    pub fn run(&mut self) -> Result<()> {
        let mut input_batch = Vec::with_capacity(1);
        let mut output_batch = Vec::with_capacity(1);

        loop {
            let element = match self.processing_time_tick_interval {
                Some(interval) => match self.input.recv_timeout(interval) {
                    Ok(element) => element,
                    Err(RecvTimeoutError::Timeout) => {
                        self.fire_processing_time(&mut output_batch)?;
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => StreamElement::End,
                },
                None => self.input.recv().unwrap_or(StreamElement::End),
            };

            if self.process_element(element, &mut input_batch, &mut output_batch)? {
                break;
            }
        }

        info!(subtask = self.subtask_index, "task finished");
        Ok(())
    }

    fn process_element(
        &mut self,
        element: StreamElement<IN>,
        input_batch: &mut Vec<IN>,
        output_batch: &mut Vec<Op::OUT>,
    ) -> Result<bool> {
        match element {
            StreamElement::Record(record) => {
                input_batch.clear();
                input_batch.push(record);

                output_batch.clear();
                self.operator.process_batch(input_batch, output_batch)?;
                self.emit(output_batch)?;
            }

            StreamElement::CheckpointBarrier(barrier) => {
                self.handle_checkpoint(barrier)?;
            }

            StreamElement::End => {
                self.forward(StreamElement::End)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn fire_processing_time(&mut self, output_batch: &mut Vec<Op::OUT>) -> Result<()> {
        output_batch.clear();
        let now = self.clock.current_processing_time();
        self.operator.on_processing_time(now, output_batch)?;
        self.emit(output_batch)
    }

    fn handle_checkpoint(&mut self, barrier: Barrier) -> Result<()> {
        let state = self.operator.snapshot_state()?;
        debug!(
            subtask = self.subtask_index,
            checkpoint_id = barrier.checkpoint_id,
            bytes = state.len(),
            "snapshotted operator state"
        );
        if let Some(sender) = &self.checkpoint_sender {
            sender
                .send(TaskCheckpointAck {
                    checkpoint_id: barrier.checkpoint_id,
                    subtask_index: self.subtask_index,
                    state,
                })
                .map_err(|_| anyhow!("checkpoint ack receiver disconnected"))?;
        }
        self.forward(StreamElement::CheckpointBarrier(barrier))
    }

    fn emit(&self, output_batch: &mut Vec<Op::OUT>) -> Result<()> {
        for output in output_batch.drain(..) {
            self.forward(StreamElement::Record(output))?;
        }
        Ok(())
    }

    fn forward(&self, element: StreamElement<Op::OUT>) -> Result<()> {
        self.output.send(element).map_err(|_| {
            anyhow!(
                "downstream of subtask {} disconnected",
                self.subtask_index
            )
        })
    }
}

#[cfg(test)]
#[path = "tests/task_tests.rs"]
mod tests;
