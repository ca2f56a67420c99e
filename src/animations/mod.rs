//! Built-in animations
//!
//! Registration order matters: the first entry is the default the
//! supervisor falls back to when nothing is requested or forced.

mod boot;
mod pulse;
mod wave;

pub use boot::boot_sweep;
pub use pulse::Pulse;
pub use wave::Wave;

use crate::core::Animation;
use crate::geometry::{FaceId, Geometry};
use std::sync::Arc;

/// All built-in animations, in selection order.
pub fn builtin_animations() -> Vec<Arc<dyn Animation>> {
    vec![Arc::new(Pulse::default()), Arc::new(Wave::default())]
}

/// Hottest sensor influencing `face`; 0 when the face has no sensors or
/// no temperatures have been published yet.
pub(crate) fn face_temperature(geometry: &Geometry, temperatures: &[u8], face: FaceId) -> u8 {
    geometry.face_to_sensors[face]
        .iter()
        .filter_map(|&sensor| temperatures.get(sensor).copied())
        .max()
        .unwrap_or(0)
}
