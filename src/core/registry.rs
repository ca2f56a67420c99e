//! Animation contract and registry
//!
//! Animations are long-running async tasks that own the frame loop for
//! as long as they are active. The registry collects the built-in set at
//! startup, validates names, and serves ordered lookups; registration
//! order is the selection order used by the supervisor.

use crate::core::state::SharedState;
use crate::geometry::Geometry;
use crate::hal::SharedSink;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Cooperative stop flag handed to every animation task.
///
/// The supervisor triggers it and waits; a well-behaved animation checks
/// it at least once per frame and returns promptly.
#[derive(Clone, Default)]
pub struct StopSignal {
    triggered: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }
}

/// Everything an animation task needs for its run.
#[derive(Clone)]
pub struct AnimationContext {
    pub sink: SharedSink,
    pub geometry: Arc<Geometry>,
    pub state: Arc<SharedState>,
    pub stop: StopSignal,
    /// Target time between flushed frames.
    pub frame_period: Duration,
}

/// One animation behaviour.
///
/// `run` owns the frame loop: paint, flush, sleep, check the stop
/// signal. Returning `Ok(())` after the signal fires is a clean stop;
/// returning early without the signal is treated as a fault by the
/// supervisor.
#[async_trait]
pub trait Animation: Send + Sync {
    /// Stable lookup name. Lowercase alphanumeric with underscores.
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: AnimationContext) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn Animation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animation")
            .field("name", &self.name())
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no animation named `{0}` is registered")]
    NotFound(String),
    #[error("animation has a blank name")]
    BlankName,
    #[error("animation name `{0}` contains invalid characters")]
    InvalidName(String),
    #[error("animation name `{0}` is already registered")]
    Duplicate(String),
}

/// Ordered collection of registered animations.
///
/// Candidates that fail validation are skipped, not fatal; their errors
/// are kept so the caller can report them once at startup.
#[derive(Default)]
pub struct AnimationRegistry {
    entries: Vec<Arc<dyn Animation>>,
    load_errors: Vec<RegistryError>,
}

impl AnimationRegistry {
    /// Build a registry from `candidates`, keeping registration order.
    pub fn discover(candidates: Vec<Arc<dyn Animation>>) -> Self {
        let mut registry = Self::default();
        for candidate in candidates {
            if let Err(err) = registry.register(candidate) {
                registry.load_errors.push(err);
            }
        }
        registry
    }

    fn register(&mut self, animation: Arc<dyn Animation>) -> Result<(), RegistryError> {
        let name = animation.name();
        if name.is_empty() {
            return Err(RegistryError::BlankName);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(RegistryError::InvalidName(name.to_owned()));
        }
        if self.entries.iter().any(|a| a.name() == name) {
            return Err(RegistryError::Duplicate(name.to_owned()));
        }
        self.entries.push(animation);
        Ok(())
    }

    /// Look up an animation by exact name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Animation>, RegistryError> {
        self.entries
            .iter()
            .find(|a| a.name() == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_owned()))
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validation errors collected during discovery.
    pub fn load_errors(&self) -> &[RegistryError] {
        &self.load_errors
    }
}
