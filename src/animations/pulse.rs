//! Proximity pulse animation
//!
//! Every face idles at half brightness of the base color. Once a face's
//! temperature crosses the pulse threshold it starts breathing, and the
//! breathing speeds up with temperature, from a slow third-of-a-hertz
//! swell to a two-hertz flutter at full heat. Dark channels get a small
//! glow at the top of each swell.

use super::face_temperature;
use crate::core::{Animation, AnimationContext};
use crate::geometry::Geometry;
use crate::hal::Color;
use async_trait::async_trait;
use log::debug;
use std::f32::consts::TAU;

/// Temperature at which a face starts pulsing.
const PULSE_START_TEMP: u8 = 30;
const MIN_FREQ_HZ: f32 = 1.0 / 3.0;
const MAX_FREQ_HZ: f32 = 2.0;
/// Brightness of a face that is not pulsing.
const BASE_BRIGHTNESS: f32 = 0.5;
/// Glow added to zero channels, scaled by how far the swell is above
/// the base brightness.
const GLOW_SPAN: f32 = 50.0;

pub struct Pulse {
    base_color: Color,
}

impl Default for Pulse {
    fn default() -> Self {
        Self {
            base_color: Color::new(127, 0, 255),
        }
    }
}

/// Pulse frequency for a face temperature, `None` below the threshold.
fn frequency_hz(temp: u8) -> Option<f32> {
    if temp < PULSE_START_TEMP {
        return None;
    }
    let span = (255 - PULSE_START_TEMP) as f32;
    let factor = (temp - PULSE_START_TEMP) as f32 / span;
    Some(MIN_FREQ_HZ + (MAX_FREQ_HZ - MIN_FREQ_HZ) * factor)
}

/// Color of one face given its swell phase, or the idle color when the
/// face is not pulsing.
fn face_color(base: Color, phase: Option<f32>) -> Color {
    let brightness = match phase {
        Some(phase) => 0.75 + 0.25 * phase.sin(),
        None => BASE_BRIGHTNESS,
    };
    let glow = ((brightness - BASE_BRIGHTNESS) * GLOW_SPAN).clamp(0.0, 255.0) as u8;
    let channel = |value: u8| -> u8 {
        if value == 0 {
            glow
        } else {
            (value as f32 * brightness).clamp(0.0, 255.0) as u8
        }
    };
    Color::new(channel(base.r), channel(base.g), channel(base.b))
}

struct FaceState {
    phase: f32,
    pulsing: bool,
}

impl Pulse {
    fn advance(&self, geometry: &Geometry, temperatures: &[u8], faces: &mut [FaceState], dt: f32) {
        for (face, state) in faces.iter_mut().enumerate() {
            let temp = face_temperature(geometry, temperatures, face);
            match frequency_hz(temp) {
                Some(freq) => {
                    state.pulsing = true;
                    state.phase = (state.phase + TAU * freq * dt) % TAU;
                }
                None => {
                    state.pulsing = false;
                    state.phase = 0.0;
                }
            }
        }
    }
}

#[async_trait]
impl Animation for Pulse {
    fn name(&self) -> &'static str {
        "pulse"
    }

    async fn run(&self, ctx: AnimationContext) -> anyhow::Result<()> {
        debug!("pulse animation starting");
        let dt = ctx.frame_period.as_secs_f32();
        let mut faces: Vec<FaceState> = (0..ctx.geometry.num_faces)
            .map(|_| FaceState {
                phase: 0.0,
                pulsing: false,
            })
            .collect();
        let mut ticker = tokio::time::interval(ctx.frame_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !ctx.stop.is_triggered() {
            let temperatures = ctx.state.snapshot().temperatures();
            self.advance(&ctx.geometry, &temperatures, &mut faces, dt);
            ctx.sink.paint(|sink| {
                for (face, state) in faces.iter().enumerate() {
                    let color = face_color(
                        self.base_color,
                        state.pulsing.then_some(state.phase),
                    );
                    for pixel in ctx.geometry.face_leds(face) {
                        sink.set_pixel(pixel, color);
                    }
                }
            })?;
            ctx.sink.flush()?;
            ticker.tick().await;
        }
        debug!("pulse animation stopped");
        Ok(())
    }
}
