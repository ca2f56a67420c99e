//! Proximity temperature filter
//!
//! Raw time-of-flight distances are too jittery to drive visuals
//! directly. Each sensor carries a virtual "temperature" in `[0, 255]`
//! that rises while something is close and slowly decays otherwise,
//! giving animations a stable presence signal.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Smoothing parameters. Passed in explicitly at construction; there is
/// no global default to reach for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Distances below this count as presence.
    pub threshold_mm: u32,
    /// Temperature gained per cycle while presence is detected.
    pub rise_step: u8,
    /// Temperature lost per cycle otherwise (including failed reads).
    pub decay_step: u8,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold_mm: 1000,
            rise_step: 10,
            decay_step: 2,
        }
    }
}

/// One filter step. Pure in (previous temperature, reading); `None` is
/// the "no reading" sentinel and behaves like an out-of-range distance.
pub fn step(config: &FilterConfig, temperature: u8, reading: Option<u32>) -> u8 {
    match reading {
        Some(distance) if distance < config.threshold_mm => {
            temperature.saturating_add(config.rise_step)
        }
        _ => temperature.saturating_sub(config.decay_step),
    }
}

/// Per-sensor temperature state.
///
/// Written by the sensor poller every cycle and reset by the supervisor
/// at animation-switch boundaries; the internal lock keeps a reset from
/// tearing against an in-flight update for the same sensor.
pub struct ProximityFilter {
    config: FilterConfig,
    temps: Mutex<Vec<u8>>,
}

impl ProximityFilter {
    pub fn new(config: FilterConfig, sensor_count: usize) -> Self {
        Self {
            config,
            temps: Mutex::new(vec![0; sensor_count]),
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Apply one reading for `sensor` and return its new temperature.
    /// Sensors beyond the constructed count are admitted lazily at
    /// baseline 0.
    pub fn update(&self, sensor: usize, reading: Option<u32>) -> u8 {
        // A poisoned lock only means another holder panicked between
        // plain integer writes; the vector itself is still coherent.
        let mut temps = self.temps.lock().unwrap_or_else(PoisonError::into_inner);
        if sensor >= temps.len() {
            temps.resize(sensor + 1, 0);
        }
        let next = step(&self.config, temps[sensor], reading);
        temps[sensor] = next;
        next
    }

    /// Reset every sensor to the baseline of 0. Called by the supervisor
    /// exactly when a new animation becomes active, before its first
    /// frame is computed.
    pub fn reset(&self) {
        let mut temps = self.temps.lock().unwrap_or_else(PoisonError::into_inner);
        temps.fill(0);
    }

    /// Current temperature of every sensor.
    pub fn temperatures(&self) -> Vec<u8> {
        let temps = self.temps.lock().unwrap_or_else(PoisonError::into_inner);
        temps.clone()
    }
}
