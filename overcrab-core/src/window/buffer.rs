use super::*;

/// Per-key buckets of rows, keyed by arrival processing time.
///
/// A bucket holds the rows of one key that arrived at the same millisecond,
/// in arrival order. All calls act on the backend's current key.
#[derive(Debug, Clone)]
pub struct WindowBuffer<IN> {
    buckets: MapStateHandle<ProcessingTime, Vec<IN>>,
}

impl<IN: StreamData> WindowBuffer<IN> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            buckets: MapStateHandle::new(name),
        }
    }

    pub fn get<B: KeyedStateBackend>(
        &self,
        backend: &B,
        ts: ProcessingTime,
    ) -> Result<Option<Vec<IN>>> {
        self.buckets.get(backend, &ts)
    }

    /// Create or replace the bucket at `ts`.
    pub fn put<B: KeyedStateBackend>(
        &self,
        backend: &mut B,
        ts: ProcessingTime,
        rows: Vec<IN>,
    ) -> Result<()> {
        self.buckets.put(backend, ts, rows)
    }

    /// Append `row` to the bucket at `ts` and return its position in that bucket.
    pub fn append<B: KeyedStateBackend>(
        &self,
        backend: &mut B,
        ts: ProcessingTime,
        row: IN,
    ) -> Result<usize> {
        let mut rows = self.get(backend, ts)?.unwrap_or_default();
        rows.push(row);
        let position = rows.len() - 1;
        self.put(backend, ts, rows)?;
        Ok(position)
    }

    /// Distinct buffered timestamps, in unspecified order.
    pub fn keys<B: KeyedStateBackend>(&self, backend: &B) -> Result<Vec<ProcessingTime>> {
        self.buckets.keys(backend)
    }

    pub fn remove<B: KeyedStateBackend>(&self, backend: &mut B, ts: ProcessingTime) -> Result<()> {
        self.buckets.remove(backend, &ts).map(|_: Option<Vec<IN>>| ())
    }

    pub fn clear<B: KeyedStateBackend>(&self, backend: &mut B) -> Result<()> {
        self.buckets.clear(backend)
    }
}
