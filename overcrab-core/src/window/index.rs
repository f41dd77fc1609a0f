use super::*;

/// Ascending, duplicate-free sequence of the processing times buffered for
/// the current key.
///
/// The index is transient: it is rebuilt from the buffer for every row and
/// cleared right after, so it never carries state from one key (or one
/// buffer version) into the next row.
#[derive(Debug, Default, Clone)]
pub struct SortedTimestamps {
    timestamps: Vec<ProcessingTime>,
}

impl SortedTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `ts` keeping the sequence sorted. Returns `false` if it was already present.
    pub fn insert(&mut self, ts: ProcessingTime) -> bool {
        match self.timestamps.binary_search(&ts) {
            Ok(_) => false,
            Err(pos) => {
                self.timestamps.insert(pos, ts);
                true
            }
        }
    }

    /// Replace the contents with `keys`, in any order and with any duplicates.
    pub fn rebuild(&mut self, keys: impl IntoIterator<Item = ProcessingTime>) {
        self.timestamps.clear();
        for ts in keys {
            self.insert(ts);
        }
    }

    /// 0-based position of `ts`, i.e. the number of distinct smaller timestamps.
    pub fn rank_of(&self, ts: ProcessingTime) -> Option<usize> {
        self.timestamps.binary_search(&ts).ok()
    }

    pub fn as_slice(&self) -> &[ProcessingTime] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
    }
}
