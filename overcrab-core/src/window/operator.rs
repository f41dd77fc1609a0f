use super::*;

const BUFFER_STATE: &str = "over-window-buffer";
const FORWARDED_STATE: &str = "over-window-forwarded";

/// Processing-time bounded ROWS over-window operator.
///
/// Accepts `(key, row)` pairs and emits every row exactly once, joined with
/// the aggregate over that row and the `lower_boundary` rows of the same key
/// that arrived immediately before it.
///
/// # Processing model
///
/// - **Rows**: stamped with the current processing time and appended to the
///   key's bucket for that millisecond. The window is then resolved from the
///   current bucket and, if it is too short, the tails of earlier buckets,
///   and handed to the executor. Buckets that can no longer be part of any
///   window are dropped.
/// - **Timers**: a per-key retention timer purges everything buffered for a
///   key that stayed idle for long enough. Due timers fire before the next
///   row is looked at, never in the middle of one.
pub struct OverWindowOperator<K, IN, ACC, E, B = HashMapStateBackend, C = SystemClock>
where
    K: StreamData,
    IN: StreamData,
    E: AggregateExecutor<IN, ACC>,
    B: KeyedStateBackend,
    C: ProcessingTimeService,
{
    config: OverWindowConfig,
    executor: E,
    backend: B,
    clock: C,
    timers: TimerService,
    retention: RetentionTimerManager,
    buffer: WindowBuffer<IN>,
    /// Rows handed to the executor but not yet emitted, oldest first.
    forwarded: ListStateHandle<IN>,
    sorted: SortedTimestamps,
    _phantom: PhantomData<fn(K) -> ACC>,
}

#[derive(Serialize, Deserialize)]
struct OverWindowSnapshot {
    backend: Vec<u8>,
    timers: TimerService,
}

/// A resolved window plus the rank of the oldest bucket it reaches into.
struct ResolvedWindow<IN> {
    rows: Vec<IN>,
    first_rank: usize,
}

impl<K, IN, ACC, E> OverWindowOperator<K, IN, ACC, E>
where
    K: StreamData,
    IN: StreamData,
    E: AggregateExecutor<IN, ACC>,
{
    /// Operator backed by the in-memory state backend and the system clock.
    pub fn with_defaults(config: OverWindowConfig, executor: E) -> Result<Self> {
        Self::new(config, executor, HashMapStateBackend::new(), SystemClock)
    }
}

impl<K, IN, ACC, E, B, C> OverWindowOperator<K, IN, ACC, E, B, C>
where
    K: StreamData,
    IN: StreamData,
    E: AggregateExecutor<IN, ACC>,
    B: KeyedStateBackend,
    C: ProcessingTimeService,
{
    pub fn new(config: OverWindowConfig, executor: E, backend: B, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            retention: RetentionTimerManager::new(&config.retention),
            config,
            executor,
            backend,
            clock,
            timers: TimerService::new(),
            buffer: WindowBuffer::new(BUFFER_STATE),
            forwarded: ListStateHandle::new(FORWARDED_STATE),
            sorted: SortedTimestamps::new(),
            _phantom: PhantomData,
        })
    }

    pub fn config(&self) -> &OverWindowConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn timers(&self) -> &TimerService {
        &self.timers
    }

    /// Process one row of `key` at the clock's current processing time.
    ///
    /// Due retention timers fire first. On success exactly one joined row is
    /// pushed to `output`; on error nothing is pushed and the row stays
    /// buffered.
    pub fn process_element(
        &mut self,
        key: &K,
        row: IN,
        output: &mut Vec<JoinedRow<IN, ACC>>,
    ) -> Result<()> {
        let now = self.clock.current_processing_time();
        self.fire_timers(now)?;

        let key_bytes = bincode::serialize(key).context("failed to serialize partition key")?;
        self.backend.set_current_key(key_bytes);

        self.buffer_input(now, row.clone())?;
        self.forwarded.add(&mut self.backend, row)?;
        self.trigger_window(now, output)
    }

    /// Fire every timer due at `now` and purge the keys whose retention expired.
    pub fn fire_timers(&mut self, now: ProcessingTime) -> Result<()> {
        for (key_bytes, fire_at) in self.timers.drain_due(now) {
            self.backend.set_current_key(key_bytes);
            if self.retention.on_timer(&mut self.backend, fire_at)? {
                self.buffer.clear(&mut self.backend)?;
                self.forwarded.clear(&mut self.backend)?;
                debug!(fire_at, now, "purged state of idle key");
            } else {
                trace!(fire_at, "ignoring stale cleanup timer");
            }
        }
        Ok(())
    }

    /// Processing times buffered for `key`, ascending.
    pub fn buffered_timestamps(&mut self, key: &K) -> Result<Vec<ProcessingTime>> {
        self.backend.set_current_key(bincode::serialize(key)?);
        let mut keys = self.buffer.keys(&self.backend)?;
        keys.sort_unstable();
        Ok(keys)
    }

    /// Rows buffered for `key` at processing time `ts`.
    pub fn buffered_rows(&mut self, key: &K, ts: ProcessingTime) -> Result<Option<Vec<IN>>> {
        self.backend.set_current_key(bincode::serialize(key)?);
        self.buffer.get(&self.backend, ts)
    }

    /// Snapshot keyed state and pending timers.
    pub fn snapshot_state(&self) -> Result<Vec<u8>> {
        let snapshot = OverWindowSnapshot {
            backend: self.backend.snapshot()?,
            timers: self.timers.clone(),
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    /// Restore keyed state and pending timers from [`snapshot_state`](Self::snapshot_state) output.
    pub fn restore_state(&mut self, data: &[u8]) -> Result<()> {
        self.sorted.clear();
        let snapshot: OverWindowSnapshot =
            bincode::deserialize(data).context("corrupt over-window snapshot")?;
        self.backend.restore(&snapshot.backend)?;
        self.timers = snapshot.timers;
        Ok(())
    }

    fn buffer_input(&mut self, now: ProcessingTime, row: IN) -> Result<()> {
        self.retention
            .register(&mut self.backend, &mut self.timers, now)?;
        self.buffer.append(&mut self.backend, now, row)?;
        Ok(())
    }

    fn trigger_window(
        &mut self,
        now: ProcessingTime,
        output: &mut Vec<JoinedRow<IN, ACC>>,
    ) -> Result<()> {
        let bucket = self.buffer.get(&self.backend, now)?.ok_or_else(|| {
            anyhow!("no buffered rows at processing time {now}; buffer is out of sync")
        })?;
        let trigger_index = bucket
            .len()
            .checked_sub(1)
            .ok_or_else(|| anyhow!("empty bucket at processing time {now}"))?;

        self.sorted.rebuild(self.buffer.keys(&self.backend)?);
        let evaluated = self.evaluate(now, &bucket, trigger_index);
        self.sorted.clear();

        let aggregate = match evaluated {
            Ok(aggregate) => aggregate,
            Err(err) => {
                self.forwarded.pop(&mut self.backend)?;
                return Err(err);
            }
        };

        let input = self
            .forwarded
            .poll(&mut self.backend)?
            .ok_or_else(|| anyhow!("aggregate computed without a forwarded input row"))?;
        output.push(JoinedRow::new(input, aggregate));
        Ok(())
    }

    fn evaluate(
        &mut self,
        now: ProcessingTime,
        bucket: &[IN],
        trigger_index: usize,
    ) -> Result<ACC> {
        let rank = self
            .sorted
            .rank_of(now)
            .ok_or_else(|| anyhow!("processing time {now} missing from the timestamp index"))?;
        let window = self.resolve_window(bucket, trigger_index, rank)?;

        let request = WindowRequest {
            bucket,
            trigger_index,
            window_rank: rank,
            rows: &window.rows,
        };
        let aggregate = self
            .executor
            .execute(&request)
            .with_context(|| format!("aggregate failed for row {trigger_index} at {now}"))?;

        self.prune_before(window.first_rank)?;
        Ok(aggregate)
    }

    /// Collect the last `window_size` rows up to and including the triggering one.
    fn resolve_window(
        &self,
        bucket: &[IN],
        trigger_index: usize,
        rank: usize,
    ) -> Result<ResolvedWindow<IN>> {
        let size = self.config.window_size();
        let in_bucket = trigger_index + 1;
        if in_bucket >= size {
            return Ok(ResolvedWindow {
                rows: bucket[in_bucket - size..in_bucket].to_vec(),
                first_rank: rank,
            });
        }

        let mut remaining = size - in_bucket;
        let mut first_rank = rank;
        // Newest segment first.
        let mut segments = Vec::new();
        for (r, ts) in self.sorted.as_slice()[..rank].iter().enumerate().rev() {
            if remaining == 0 {
                break;
            }
            let mut rows = self
                .buffer
                .get(&self.backend, *ts)?
                .ok_or_else(|| anyhow!("indexed bucket at {ts} is not buffered"))?;
            let take = remaining.min(rows.len());
            segments.push(rows.split_off(rows.len() - take));
            remaining -= take;
            first_rank = r;
        }

        let mut rows = Vec::with_capacity(size - remaining);
        for segment in segments.into_iter().rev() {
            rows.extend(segment);
        }
        rows.extend_from_slice(&bucket[..in_bucket]);
        Ok(ResolvedWindow { rows, first_rank })
    }

    /// Drop buckets older than the oldest one the current window reached into.
    fn prune_before(&mut self, first_rank: usize) -> Result<()> {
        for ts in &self.sorted.as_slice()[..first_rank] {
            self.buffer.remove(&mut self.backend, *ts)?;
        }
        if first_rank > 0 {
            debug!(pruned = first_rank, "dropped buckets outside the window");
        }
        Ok(())
    }
}

impl<K, IN, ACC, E, B, C> Operator<(K, IN)> for OverWindowOperator<K, IN, ACC, E, B, C>
where
    K: StreamData,
    IN: StreamData,
    ACC: Send,
    E: AggregateExecutor<IN, ACC>,
    B: KeyedStateBackend,
    C: ProcessingTimeService,
{
    type OUT = JoinedRow<IN, ACC>;

    fn process_batch(&mut self, input: &[(K, IN)], output: &mut Vec<Self::OUT>) -> Result<()> {
        for (key, row) in input {
            self.process_element(key, row.clone(), output)?;
        }
        Ok(())
    }

    fn on_processing_time(
        &mut self,
        now: ProcessingTime,
        _output: &mut Vec<Self::OUT>,
    ) -> Result<()> {
        self.fire_timers(now)
    }

    fn snapshot_state(&self) -> Result<Vec<u8>> {
        OverWindowOperator::snapshot_state(self)
    }

    fn restore_state(&mut self, data: &[u8]) -> Result<()> {
        OverWindowOperator::restore_state(self, data)
    }
}
