//! Core runtime: shared state, proximity filtering, animation registry,
//! sensor polling and the animation supervisor.

pub mod filter;
pub mod poller;
pub mod registry;
pub mod state;
pub mod supervisor;

pub use filter::{FilterConfig, ProximityFilter};
pub use poller::{PollerConfig, SensorPoller};
pub use registry::{
    Animation, AnimationContext, AnimationRegistry, RegistryError, StopSignal,
};
pub use state::{SharedState, Snapshot, KEY_ANIMATION, KEY_DISTANCES, KEY_TEMPERATURES};
pub use supervisor::{
    AnimationSupervisor, SelectionPolicy, SupervisorConfig, SupervisorProbe, SupervisorState,
    SupervisorStats, TaskFault,
};
