//! Thread-per-subtask execution of a keyed operator.

use std::hash::Hash;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, unbounded, Sender};
use tracing::{info, warn};

use crate::types::StreamElement;

use super::{HashPartitioner, Operator, Partitioner, Task};

/// Default capacity of each subtask's input channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Runs `parallelism` instances of an operator over a keyed input, each on its
/// own thread.
///
/// Records are hash-partitioned by key, so all rows of one key reach the same
/// instance in input order. Output order is preserved per key only.
pub struct ParallelRunner<F> {
    parallelism: usize,
    channel_capacity: usize,
    tick_interval: Option<Duration>,
    operator_factory: F,
}

impl<F> ParallelRunner<F> {
    /// `operator_factory` is called once per subtask index.
    pub fn new(parallelism: usize, operator_factory: F) -> Result<Self> {
        if parallelism == 0 {
            bail!("parallelism must be at least 1");
        }
        Ok(Self {
            parallelism,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            tick_interval: None,
            operator_factory,
        })
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Let idle subtasks fire their processing-time timers every `interval`.
    pub fn with_processing_time_tick(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Feed `input` through the subtasks and collect every output record.
    ///
    /// Fails with the first subtask error, if any.
    pub fn run<K, IN, Op, I>(mut self, input: I) -> Result<Vec<Op::OUT>>
    where
        F: FnMut(usize) -> Result<Op>,
        K: Hash + Clone + Send + 'static,
        IN: Send + 'static,
        Op: Operator<(K, IN)> + 'static,
        Op::OUT: 'static,
        I: IntoIterator<Item = (K, IN)>,
    {
        let (out_tx, out_rx) = unbounded();
        let mut inputs: Vec<Sender<StreamElement<(K, IN)>>> = Vec::with_capacity(self.parallelism);
        let mut handles: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(self.parallelism);

        for subtask in 0..self.parallelism {
            let operator = (self.operator_factory)(subtask)
                .with_context(|| format!("failed to create operator for subtask {subtask}"))?;
            let (in_tx, in_rx) = bounded(self.channel_capacity);
            let mut task = Task::new(subtask, in_rx, out_tx.clone(), operator);
            if let Some(interval) = self.tick_interval {
                task = task.with_processing_time_tick(interval);
            }
            let handle = std::thread::Builder::new()
                .name(format!("overcrab-task-{subtask}"))
                .spawn(move || task.run())
                .context("failed to spawn task thread")?;
            inputs.push(in_tx);
            handles.push(handle);
        }
        drop(out_tx);
        info!(parallelism = self.parallelism, "started subtasks");

        let partitioner = HashPartitioner::new(|(key, _): &(K, IN)| key.clone());
        let mut routed = 0usize;
        for record in input {
            let target = partitioner.partition(&record, self.parallelism);
            if inputs[target].send(StreamElement::Record(record)).is_err() {
                warn!(subtask = target, "subtask stopped accepting input");
                break;
            }
            routed += 1;
        }
        for sender in &inputs {
            // A subtask that already failed reports its error on join.
            let _ = sender.send(StreamElement::End);
        }
        drop(inputs);

        let mut first_error = None;
        for (subtask, handle) in handles.into_iter().enumerate() {
            let result = handle
                .join()
                .map_err(|_| anyhow!("subtask {subtask} panicked"))
                .and_then(|result| result.with_context(|| format!("subtask {subtask} failed")));
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let outputs: Vec<Op::OUT> = out_rx
            .try_iter()
            .filter_map(|element| match element {
                StreamElement::Record(output) => Some(output),
                _ => None,
            })
            .collect();
        info!(routed, emitted = outputs.len(), "all subtasks finished");
        Ok(outputs)
    }
}

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;
