//! Configuration management

mod control;
mod settings;

pub use control::{
    read_forced_animation, read_shape_selection, FORCED_ANIMATION_FILE, SHAPE_SELECTION_FILE,
};
pub use settings::RuntimeConfig;
