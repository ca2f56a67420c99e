//! Shared runtime state
//!
//! A small key/value board written by the sensor poller and read by the
//! running animation and the supervisor. Readers always get an owned
//! snapshot, so no reference into the map outlives the lock and the
//! critical section stays bounded.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Latest filtered distance per sensor, `null` where the cycle had no
/// reading.
pub const KEY_DISTANCES: &str = "distances";
/// Latest temperature per sensor.
pub const KEY_TEMPERATURES: &str = "temperatures";
/// Name of the animation most recently requested at runtime.
pub const KEY_ANIMATION: &str = "animation";

/// Concurrent key/value state board.
///
/// Values are JSON so producers and consumers stay decoupled; a writer
/// that publishes several keys for the same cycle uses [`set_many`] so
/// readers never observe a half-updated cycle.
///
/// [`set_many`]: SharedState::set_many
#[derive(Default)]
pub struct SharedState {
    values: Mutex<HashMap<String, Value>>,
}

/// Owned point-in-time copy of the state board.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    values: HashMap<String, Value>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one value, replacing any previous value for the key.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let mut values = self.lock();
        values.insert(key.into(), value);
    }

    /// Store several values atomically under one lock acquisition.
    pub fn set_many(&self, entries: impl IntoIterator<Item = (String, Value)>) {
        let mut values = self.lock();
        for (key, value) in entries {
            values.insert(key, value);
        }
    }

    /// Take an owned snapshot of the whole board.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            values: self.lock().clone(),
        }
    }

    /// Read a single value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // Writers only ever insert fully built values, so the map stays
        // coherent even if a holder panicked.
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Snapshot {
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Filtered distances in millimetres, `None` per sensor where the
    /// last cycle had no reading. Empty before the first poll.
    pub fn distances(&self) -> Vec<Option<u32>> {
        self.u32_array(KEY_DISTANCES)
    }

    /// Temperatures per sensor. Empty before the first poll.
    pub fn temperatures(&self) -> Vec<u8> {
        self.u32_array(KEY_TEMPERATURES)
            .into_iter()
            .map(|t| t.unwrap_or(0).min(255) as u8)
            .collect()
    }

    /// Animation requested at runtime, if any.
    pub fn requested_animation(&self) -> Option<String> {
        self.values
            .get(KEY_ANIMATION)?
            .as_str()
            .map(str::to_owned)
    }

    fn u32_array(&self, key: &str) -> Vec<Option<u32>> {
        let Some(Value::Array(items)) = self.values.get(key) else {
            return Vec::new();
        };
        items
            .iter()
            .map(|v| v.as_u64().map(|n| n.min(u32::MAX as u64) as u32))
            .collect()
    }
}
