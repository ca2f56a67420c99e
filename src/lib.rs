//! polyglow: animation runtime for addressable-LED platonic-solid
//! sculptures
//!
//! This library provides the building blocks of the runtime:
//! - Shape geometry descriptors loaded from JSON
//! - Proximity sensing with temperature smoothing
//! - An animation registry and the supervising state machine
//! - Hardware seams for the LED strip and the sensor array

pub mod animations;
pub mod config;
pub mod core;
pub mod geometry;
pub mod hal;

// Re-export commonly used types
pub use config::RuntimeConfig;
pub use core::{Animation, AnimationRegistry, AnimationSupervisor, SharedState};
pub use geometry::Geometry;
