//! # State Management
//!
//! Keyed state backends for stateful stream processing.
//!
//! ## State Types
//!
//! - [`ValueStateHandle`] — Single value per key
//! - [`ListStateHandle`] — Ordered list (queue) of values per key
//! - [`MapStateHandle`] — Map of key-value pairs per key
//!
//! Handles are lightweight descriptors: they hold only the state name and are
//! passed the backend on every call, so operators can own handles and the
//! backend side by side without borrow conflicts.
//!
//! ## Backends
//!
//! - [`HashMapStateBackend`] — In-memory HashMap keyed by `(current_key, state_name)`

use std::marker::PhantomData;

use crate::types::StreamData;
use anyhow::Result;

pub mod hashmap;

pub use hashmap::HashMapStateBackend;

/// Keyed state backend: manages state for the current processing key.
///
/// The backend maintains a "current key" context. All state operations
/// are scoped to this key; there is no operation that reads or writes
/// another key's state.
pub trait KeyedStateBackend: Send {
    /// Set the current processing key.
    ///
    /// All subsequent state operations will be scoped to this key.
    fn set_current_key(&mut self, key: Vec<u8>);

    /// The current processing key, if one has been set.
    fn current_key(&self) -> Option<&[u8]>;

    fn get_value<V: StreamData>(&self, name: &str) -> Result<Option<V>>;
    fn put_value<V: StreamData>(&mut self, name: &str, value: V) -> Result<()>;
    fn clear_value(&mut self, name: &str) -> Result<()>;

    fn get_list<V: StreamData>(&self, name: &str) -> Result<Vec<V>>;
    fn add_to_list<V: StreamData>(&mut self, name: &str, value: V) -> Result<()>;
    /// Remove and return the oldest list element.
    fn poll_list<V: StreamData>(&mut self, name: &str) -> Result<Option<V>>;
    /// Remove and return the newest list element.
    fn pop_list<V: StreamData>(&mut self, name: &str) -> Result<Option<V>>;
    fn clear_list(&mut self, name: &str) -> Result<()>;

    fn get_from_map<K, V>(&self, name: &str, key: &K) -> Result<Option<V>>
    where
        K: StreamData,
        V: StreamData;
    fn put_in_map<K, V>(&mut self, name: &str, key: K, value: V) -> Result<()>
    where
        K: StreamData,
        V: StreamData;
    fn remove_from_map<K, V>(&mut self, name: &str, key: &K) -> Result<Option<V>>
    where
        K: StreamData,
        V: StreamData;
    /// All map keys for the current key, in unspecified order.
    fn map_keys<K: StreamData>(&self, name: &str) -> Result<Vec<K>>;
    fn clear_map(&mut self, name: &str) -> Result<()>;

    /// Snapshot all state for checkpointing.
    fn snapshot(&self) -> Result<Vec<u8>>;

    /// Restore state from a checkpoint.
    fn restore(&mut self, data: &[u8]) -> Result<()>;
}

/// Descriptor for a single value per key.
#[derive(Debug, Clone)]
pub struct ValueStateHandle<V> {
    name: String,
    _phantom: PhantomData<V>,
}

impl<V: StreamData> ValueStateHandle<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _phantom: PhantomData,
        }
    }

    pub fn get<B: KeyedStateBackend>(&self, backend: &B) -> Result<Option<V>> {
        backend.get_value(&self.name)
    }

    pub fn put<B: KeyedStateBackend>(&self, backend: &mut B, value: V) -> Result<()> {
        backend.put_value(&self.name, value)
    }

    pub fn clear<B: KeyedStateBackend>(&self, backend: &mut B) -> Result<()> {
        backend.clear_value(&self.name)
    }
}

/// Descriptor for an ordered list per key, usable as a FIFO queue.
#[derive(Debug, Clone)]
pub struct ListStateHandle<V> {
    name: String,
    _phantom: PhantomData<V>,
}

impl<V: StreamData> ListStateHandle<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _phantom: PhantomData,
        }
    }

    pub fn get<B: KeyedStateBackend>(&self, backend: &B) -> Result<Vec<V>> {
        backend.get_list(&self.name)
    }

    pub fn add<B: KeyedStateBackend>(&self, backend: &mut B, value: V) -> Result<()> {
        backend.add_to_list(&self.name, value)
    }

    /// Pop the oldest element.
    pub fn poll<B: KeyedStateBackend>(&self, backend: &mut B) -> Result<Option<V>> {
        backend.poll_list(&self.name)
    }

    /// Pop the newest element.
    pub fn pop<B: KeyedStateBackend>(&self, backend: &mut B) -> Result<Option<V>> {
        backend.pop_list(&self.name)
    }

    pub fn clear<B: KeyedStateBackend>(&self, backend: &mut B) -> Result<()> {
        backend.clear_list(&self.name)
    }
}

/// Descriptor for a map of key-value pairs per key.
#[derive(Debug, Clone)]
pub struct MapStateHandle<K, V> {
    name: String,
    _phantom: PhantomData<(K, V)>,
}

impl<K: StreamData, V: StreamData> MapStateHandle<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _phantom: PhantomData,
        }
    }

    pub fn get<B: KeyedStateBackend>(&self, backend: &B, key: &K) -> Result<Option<V>> {
        backend.get_from_map(&self.name, key)
    }

    pub fn put<B: KeyedStateBackend>(&self, backend: &mut B, key: K, value: V) -> Result<()> {
        backend.put_in_map(&self.name, key, value)
    }

    pub fn remove<B: KeyedStateBackend>(&self, backend: &mut B, key: &K) -> Result<Option<V>> {
        backend.remove_from_map(&self.name, key)
    }

    pub fn keys<B: KeyedStateBackend>(&self, backend: &B) -> Result<Vec<K>> {
        backend.map_keys(&self.name)
    }

    pub fn clear<B: KeyedStateBackend>(&self, backend: &mut B) -> Result<()> {
        backend.clear_map(&self.name)
    }
}
