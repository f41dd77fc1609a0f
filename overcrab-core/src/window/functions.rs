use super::*;

/// Everything an executor gets to see when a row triggers its window.
///
/// `rows` is the materialized window, oldest row first and the triggering row
/// last. It holds `lower_boundary + 1` rows, or fewer while the key has not
/// buffered that many yet. `bucket`, `trigger_index` and `window_rank` describe
/// where the triggering row sits in the per-key buffer.
#[derive(Debug, Clone, Copy)]
pub struct WindowRequest<'a, IN> {
    /// All rows of the key that arrived at the triggering row's processing time.
    pub bucket: &'a [IN],
    /// Position of the triggering row within `bucket`.
    pub trigger_index: usize,
    /// Number of distinct earlier timestamps still buffered for the key.
    pub window_rank: usize,
    pub rows: &'a [IN],
}

impl<'a, IN> WindowRequest<'a, IN> {
    pub fn trigger_row(&self) -> Option<&'a IN> {
        self.bucket.get(self.trigger_index)
    }
}

/// Computes the aggregate of one window.
///
/// Called once per input row, after the row has been buffered. An error
/// aborts the row: nothing is emitted for it and the error reaches the caller
/// of the operator.
pub trait AggregateExecutor<IN, ACC>: Send {
    fn execute(&mut self, request: &WindowRequest<'_, IN>) -> Result<ACC>;
}

/// Incremental aggregation function.
///
/// A fresh accumulator is folded over the window rows on every evaluation.
pub trait AggregateFunction<IN, ACC, OUT>: Send {
    /// Create a fresh accumulator for a new window.
    fn create_accumulator(&self) -> ACC;
    /// Fold one element into the accumulator.
    fn add(&self, acc: &mut ACC, element: &IN);
    /// Convert the final accumulator into the window result.
    fn get_result(&self, acc: ACC) -> OUT;
}

/// Runs an [`AggregateFunction`] over the materialized window rows.
pub struct AggregateFunctionExecutor<F, ACC> {
    function: F,
    _phantom: PhantomData<fn() -> ACC>,
}

impl<F, ACC> AggregateFunctionExecutor<F, ACC> {
    pub fn new(function: F) -> Self {
        Self {
            function,
            _phantom: PhantomData,
        }
    }
}

impl<IN, ACC, OUT, F> AggregateExecutor<IN, OUT> for AggregateFunctionExecutor<F, ACC>
where
    F: AggregateFunction<IN, ACC, OUT>,
{
    fn execute(&mut self, request: &WindowRequest<'_, IN>) -> Result<OUT> {
        let mut acc = self.function.create_accumulator();
        for row in request.rows {
            self.function.add(&mut acc, row);
        }
        Ok(self.function.get_result(acc))
    }
}

/// Adapts a fallible closure over the window rows into an executor.
pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<IN, OUT, F> AggregateExecutor<IN, OUT> for FnExecutor<F>
where
    F: FnMut(&[IN]) -> Result<OUT> + Send,
{
    fn execute(&mut self, request: &WindowRequest<'_, IN>) -> Result<OUT> {
        (self.f)(request.rows)
    }
}
