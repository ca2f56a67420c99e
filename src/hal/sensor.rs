//! Distance sensor collaborator
//!
//! A real deployment wires this to a time-of-flight sensor array; the
//! implementation is expected to bound its own bus timeouts so a read
//! never blocks longer than one polling interval.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Per-sensor read failure. Always transient from the runtime's point of
/// view: the poller records a "no reading" for the cycle and moves on.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor {0} timed out")]
    Timeout(usize),
    #[error("sensor {0} is not configured")]
    Offline(usize),
    #[error("sensor {0} bus error: {1}")]
    Bus(usize, String),
}

/// Proximity sensor array, one distance reading per sensor id.
#[async_trait]
pub trait DistanceSensor: Send {
    /// Number of sensors in the array.
    fn sensor_count(&self) -> usize;

    /// Read one sensor's distance in millimetres.
    async fn read(&mut self, sensor: usize) -> Result<u32, SensorError>;
}

/// Simulated sensor array for running without hardware.
///
/// Each sensor does a bounded random walk; occasionally a sensor "sees"
/// something approach and ramps down towards a near distance, which is
/// enough to exercise the temperature filter end to end.
pub struct SimulatedSensor {
    distances: Vec<u32>,
    approaching: Vec<bool>,
    min_mm: u32,
    max_mm: u32,
    rng: StdRng,
}

impl SimulatedSensor {
    pub fn new(sensor_count: usize) -> Self {
        Self::with_range(sensor_count, 150, 2200)
    }

    pub fn with_range(sensor_count: usize, min_mm: u32, max_mm: u32) -> Self {
        Self {
            distances: vec![max_mm; sensor_count],
            approaching: vec![false; sensor_count],
            min_mm,
            max_mm,
            rng: StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl DistanceSensor for SimulatedSensor {
    fn sensor_count(&self) -> usize {
        self.distances.len()
    }

    async fn read(&mut self, sensor: usize) -> Result<u32, SensorError> {
        let Some(current) = self.distances.get(sensor).copied() else {
            return Err(SensorError::Offline(sensor));
        };

        // Flip direction now and then so presence comes and goes.
        if self.rng.gen_ratio(1, 50) {
            self.approaching[sensor] = !self.approaching[sensor];
        }

        let step = self.rng.gen_range(0..120);
        let next = if self.approaching[sensor] {
            current.saturating_sub(step).max(self.min_mm)
        } else {
            (current + step).min(self.max_mm)
        };
        self.distances[sensor] = next;

        // Rare transient failure, mirroring a flaky I2C bus.
        if self.rng.gen_ratio(1, 200) {
            return Err(SensorError::Timeout(sensor));
        }

        Ok(next)
    }
}
