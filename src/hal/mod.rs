//! Hardware collaborator seams
//!
//! The runtime never talks to hardware directly; it goes through the
//! traits defined here. Real deployments plug in a WS281x driver and a
//! VL53L0X array, the test suite and the demo binary plug in the
//! in-memory/simulated implementations.

pub mod led;
pub mod sensor;

pub use led::{Color, LedSink, MemoryProbe, MemorySink, SharedSink};
pub use sensor::{DistanceSensor, SensorError, SimulatedSensor};
