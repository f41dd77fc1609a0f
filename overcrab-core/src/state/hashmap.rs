//! HashMap-based state backend for Local mode.
//!
//! Uses the descriptor pattern: zero-overhead state access with no Arc/Mutex/RefCell.

use super::KeyedStateBackend;
use crate::types::StreamData;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

type StateKey = (Vec<u8>, String);

/// In-memory state backend using HashMap.
///
/// Every entry is addressed by `(current_key, state_name)`, so two partition
/// keys never share an entry. Values are stored as bincode bytes; a handle's
/// type parameter decides how they are decoded.
#[derive(Debug, Default)]
pub struct HashMapStateBackend {
    /// Value states: (key, state_name) -> value_bytes
    value_states: HashMap<StateKey, Vec<u8>>,
    /// List states: (key, state_name) -> queue of elem_bytes
    list_states: HashMap<StateKey, VecDeque<Vec<u8>>>,
    /// Map states: (key, state_name) -> HashMap<k_bytes, v_bytes>
    map_states: HashMap<StateKey, HashMap<Vec<u8>, Vec<u8>>>,
    /// Current processing key
    current_key: Option<Vec<u8>>,
}

impl HashMapStateBackend {
    /// Create a new empty HashMap state backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-empty state entries across all keys.
    pub fn entry_count(&self) -> usize {
        self.value_states.len() + self.list_states.len() + self.map_states.len()
    }

    /// Whether no state is held for any key.
    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    fn state_key(&self, name: &str) -> Result<StateKey> {
        let key = self
            .current_key
            .as_ref()
            .ok_or_else(|| anyhow!("No current key set"))?;
        Ok((key.clone(), name.to_string()))
    }
}

/// Snapshot container for checkpointing.
#[derive(Serialize, Deserialize)]
struct SnapshotData {
    value_states: HashMap<StateKey, Vec<u8>>,
    list_states: HashMap<StateKey, VecDeque<Vec<u8>>>,
    map_states: HashMap<StateKey, HashMap<Vec<u8>, Vec<u8>>>,
}

impl KeyedStateBackend for HashMapStateBackend {
    fn set_current_key(&mut self, key: Vec<u8>) {
        self.current_key = Some(key);
    }

    fn current_key(&self) -> Option<&[u8]> {
        self.current_key.as_deref()
    }

    // ========== ValueState operations ==========

    fn get_value<V: StreamData>(&self, name: &str) -> Result<Option<V>> {
        let state_key = self.state_key(name)?;
        match self.value_states.get(&state_key) {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn put_value<V: StreamData>(&mut self, name: &str, value: V) -> Result<()> {
        let state_key = self.state_key(name)?;
        let bytes = bincode::serialize(&value)?;
        self.value_states.insert(state_key, bytes);
        Ok(())
    }

    fn clear_value(&mut self, name: &str) -> Result<()> {
        let state_key = self.state_key(name)?;
        self.value_states.remove(&state_key);
        Ok(())
    }

    // ========== ListState operations ==========

    fn get_list<V: StreamData>(&self, name: &str) -> Result<Vec<V>> {
        let state_key = self.state_key(name)?;
        match self.list_states.get(&state_key) {
            Some(elems) => {
                let mut out = Vec::with_capacity(elems.len());
                for b in elems {
                    out.push(bincode::deserialize(b)?);
                }
                Ok(out)
            }
            None => Ok(Vec::new()),
        }
    }

    fn add_to_list<V: StreamData>(&mut self, name: &str, value: V) -> Result<()> {
        let state_key = self.state_key(name)?;
        let bytes = bincode::serialize(&value)?;
        self.list_states.entry(state_key).or_default().push_back(bytes);
        Ok(())
    }

    fn poll_list<V: StreamData>(&mut self, name: &str) -> Result<Option<V>> {
        let state_key = self.state_key(name)?;
        let Some(elems) = self.list_states.get_mut(&state_key) else {
            return Ok(None);
        };
        let polled = elems.pop_front();
        if elems.is_empty() {
            self.list_states.remove(&state_key);
        }
        match polled {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn pop_list<V: StreamData>(&mut self, name: &str) -> Result<Option<V>> {
        let state_key = self.state_key(name)?;
        let Some(elems) = self.list_states.get_mut(&state_key) else {
            return Ok(None);
        };
        let popped = elems.pop_back();
        if elems.is_empty() {
            self.list_states.remove(&state_key);
        }
        match popped {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn clear_list(&mut self, name: &str) -> Result<()> {
        let state_key = self.state_key(name)?;
        self.list_states.remove(&state_key);
        Ok(())
    }

    // ========== MapState operations ==========

    fn get_from_map<K, V>(&self, name: &str, key: &K) -> Result<Option<V>>
    where
        K: StreamData,
        V: StreamData,
    {
        let state_key = self.state_key(name)?;
        let kbytes = bincode::serialize(key)?;

        match self.map_states.get(&state_key) {
            Some(map) => match map.get(&kbytes) {
                Some(vbytes) => Ok(Some(bincode::deserialize(vbytes)?)),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    fn put_in_map<K, V>(&mut self, name: &str, key: K, value: V) -> Result<()>
    where
        K: StreamData,
        V: StreamData,
    {
        let state_key = self.state_key(name)?;
        let kbytes = bincode::serialize(&key)?;
        let vbytes = bincode::serialize(&value)?;

        self.map_states
            .entry(state_key)
            .or_default()
            .insert(kbytes, vbytes);
        Ok(())
    }

    fn remove_from_map<K, V>(&mut self, name: &str, key: &K) -> Result<Option<V>>
    where
        K: StreamData,
        V: StreamData,
    {
        let state_key = self.state_key(name)?;
        let kbytes = bincode::serialize(key)?;

        let Some(map) = self.map_states.get_mut(&state_key) else {
            return Ok(None);
        };
        let removed = map.remove(&kbytes);
        if map.is_empty() {
            self.map_states.remove(&state_key);
        }
        match removed {
            Some(vbytes) => Ok(Some(bincode::deserialize(&vbytes)?)),
            None => Ok(None),
        }
    }

    fn map_keys<K: StreamData>(&self, name: &str) -> Result<Vec<K>> {
        let state_key = self.state_key(name)?;
        match self.map_states.get(&state_key) {
            Some(map) => {
                let mut out = Vec::with_capacity(map.len());
                for kbytes in map.keys() {
                    out.push(bincode::deserialize(kbytes)?);
                }
                Ok(out)
            }
            None => Ok(Vec::new()),
        }
    }

    fn clear_map(&mut self, name: &str) -> Result<()> {
        let state_key = self.state_key(name)?;
        self.map_states.remove(&state_key);
        Ok(())
    }

    // ========== Snapshot/Restore ==========

    fn snapshot(&self) -> Result<Vec<u8>> {
        let data = SnapshotData {
            value_states: self.value_states.clone(),
            list_states: self.list_states.clone(),
            map_states: self.map_states.clone(),
        };
        bincode::serialize(&data).map_err(|e| anyhow!("Snapshot failed: {}", e))
    }

    fn restore(&mut self, data: &[u8]) -> Result<()> {
        let snap: SnapshotData =
            bincode::deserialize(data).map_err(|e| anyhow!("Restore failed: {}", e))?;
        self.value_states = snap.value_states;
        self.list_states = snap.list_states;
        self.map_states = snap.map_states;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/hashmap_tests.rs"]
mod tests;
