//! Sensor polling loop
//!
//! Reads every sensor once per cycle, applies the mounting offset and
//! the temperature filter, and publishes the cycle's distances and
//! temperatures to shared state in a single write. A failed read only
//! blanks that sensor for the cycle; the rest of the array is
//! unaffected.

use crate::core::filter::ProximityFilter;
use crate::core::registry::StopSignal;
use crate::core::state::{SharedState, KEY_DISTANCES, KEY_TEMPERATURES};
use crate::hal::DistanceSensor;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Time between polling cycles.
    pub interval_ms: u64,
    /// Sensor mounting depth, subtracted from every raw reading.
    pub offset_mm: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            offset_mm: 50,
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Owns the sensor array and drives the filter.
pub struct SensorPoller {
    sensor: Box<dyn DistanceSensor>,
    filter: Arc<ProximityFilter>,
    state: Arc<SharedState>,
    config: PollerConfig,
}

impl SensorPoller {
    pub fn new(
        sensor: Box<dyn DistanceSensor>,
        filter: Arc<ProximityFilter>,
        state: Arc<SharedState>,
        config: PollerConfig,
    ) -> Self {
        Self {
            sensor,
            filter,
            state,
            config,
        }
    }

    /// One full polling cycle: read every sensor, update the filter,
    /// publish distances and temperatures together.
    pub async fn poll_once(&mut self) {
        let count = self.sensor.sensor_count();
        let mut distances: Vec<Option<u32>> = Vec::with_capacity(count);
        for id in 0..count {
            match self.sensor.read(id).await {
                Ok(raw) => distances.push(Some(raw.saturating_sub(self.config.offset_mm))),
                Err(err) => {
                    warn!("sensor read failed, skipping this cycle: {err}");
                    distances.push(None);
                }
            }
        }

        let temperatures: Vec<u8> = distances
            .iter()
            .enumerate()
            .map(|(id, &reading)| self.filter.update(id, reading))
            .collect();

        debug!("poll cycle: distances={distances:?} temperatures={temperatures:?}");

        let distances_json: Vec<Value> = distances
            .iter()
            .map(|d| d.map_or(Value::Null, |mm| json!(mm)))
            .collect();
        self.state.set_many([
            (KEY_DISTANCES.to_owned(), Value::Array(distances_json)),
            (KEY_TEMPERATURES.to_owned(), json!(temperatures)),
        ]);
    }

    /// Polling loop. Runs until `stop` is triggered. The interval timer
    /// keeps long-term cadence even when individual cycles run long.
    pub async fn run(mut self, stop: StopSignal) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if stop.is_triggered() {
                break;
            }
            self.poll_once().await;
        }
        debug!("sensor poller stopped");
    }
}
