//! # Partitioner
//!
//! Routes keyed records to parallel operator instances. Every record of a key
//! lands on the same instance, which is what keeps per-key state
//! single-threaded.

use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use ahash::AHasher;

/// Trait for partitioning data across parallel instances.
pub trait Partitioner<T>: Send + Sync {
    /// Determine which partition (0..num_partitions) this value should go to.
    fn partition(&self, value: &T, num_partitions: usize) -> usize;
}

/// Hash-based partitioner using a key selector function.
///
/// Uses ahash with fixed keys, so a key maps to the same partition for the
/// whole life of the process.
pub struct HashPartitioner<K, F> {
    key_selector: F,
    _phantom: PhantomData<fn() -> K>,
}

impl<K, F> HashPartitioner<K, F> {
    /// Create a new hash partitioner with the given key selector.
    pub fn new(key_selector: F) -> Self {
        Self {
            key_selector,
            _phantom: PhantomData,
        }
    }
}

impl<K, T, F> Partitioner<T> for HashPartitioner<K, F>
where
    K: Hash,
    F: Fn(&T) -> K + Send + Sync,
{
    fn partition(&self, value: &T, num_partitions: usize) -> usize {
        let key = (self.key_selector)(value);
        let mut hasher = AHasher::default();
        key.hash(&mut hasher);
        let hash = hasher.finish();
        (hash as usize) % num_partitions
    }
}

#[cfg(test)]
#[path = "tests/partitioner_tests.rs"]
mod tests;
