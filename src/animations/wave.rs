//! Layer wave animation
//!
//! A bright band bounces up and down the shape's layers. Intensity falls
//! off with distance from the band; proximity drains the blue channel of
//! the affected faces, shifting them from purple towards red.

use super::face_temperature;
use crate::core::{Animation, AnimationContext};
use crate::geometry::Geometry;
use crate::hal::Color;
use async_trait::async_trait;
use log::debug;

const NUM_STEPS: i32 = 100;
const MIN_INTENSITY: i32 = 50;
const FALLOFF_PER_STEP: i32 = 30;

#[derive(Default)]
pub struct Wave;

/// Per-face colors for one step of the sweep.
fn frame_colors(geometry: &Geometry, temperatures: &[u8], step: i32) -> Vec<Color> {
    let layer_ratio = NUM_STEPS as f32 / geometry.layers.len() as f32;
    let mut colors = vec![Color::BLACK; geometry.num_faces];
    for (layer_idx, layer) in geometry.layers.iter().enumerate() {
        let location = layer_idx as f32 * layer_ratio;
        let distance = (step as f32 - location).abs() as i32;
        let intensity = (255 - distance * FALLOFF_PER_STEP).max(MIN_INTENSITY) as u8;
        for &face in layer {
            let temp = face_temperature(geometry, temperatures, face);
            let blue = intensity as u32 * (255 - temp as u32) / 255;
            colors[face] = Color::new(intensity, 0, blue as u8);
        }
    }
    colors
}

#[async_trait]
impl Animation for Wave {
    fn name(&self) -> &'static str {
        "wave"
    }

    async fn run(&self, ctx: AnimationContext) -> anyhow::Result<()> {
        debug!("wave animation starting");
        let mut step: i32 = 0;
        let mut direction: i32 = 1;
        let mut ticker = tokio::time::interval(ctx.frame_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !ctx.stop.is_triggered() {
            let temperatures = ctx.state.snapshot().temperatures();
            let colors = frame_colors(&ctx.geometry, &temperatures, step);
            ctx.sink.paint(|sink| {
                for (face, &color) in colors.iter().enumerate() {
                    for pixel in ctx.geometry.face_leds(face) {
                        sink.set_pixel(pixel, color);
                    }
                }
            })?;
            ctx.sink.flush()?;

            step += direction;
            if step >= NUM_STEPS {
                step = NUM_STEPS - 1;
                direction = -1;
            } else if step < 0 {
                step = 0;
                direction = 1;
            }
            ticker.tick().await;
        }
        debug!("wave animation stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOWER_JSON: &str = r#"{
        "led_per_face": 1,
        "sensors": 2,
        "faces": [
            { "sensors": [0], "pos": [0.0, 0.0, 0.0], "layer": 0, "index": 0 },
            { "sensors": [1], "pos": [0.0, 0.0, 1.0], "layer": 1, "index": 0 },
            { "sensors": [],  "pos": [0.0, 0.0, 2.0], "layer": 2, "index": 0 },
            { "sensors": [],  "pos": [0.0, 0.0, 3.0], "layer": 3, "index": 0 }
        ]
    }"#;

    fn tower() -> Geometry {
        Geometry::from_json("tower", TOWER_JSON).unwrap()
    }

    #[test]
    fn band_is_brightest_at_its_own_layer() {
        let geo = tower();
        // Step 0 sits on layer 0 (locations 0, 25, 50, 75); every other
        // layer is far enough to clamp to the floor intensity.
        let colors = frame_colors(&geo, &[0, 0], 0);
        assert_eq!(colors[0], Color::new(255, 0, 255));
        assert_eq!(colors[2], Color::new(50, 0, 50));

        // Step 25 sits on layer 1.
        let colors = frame_colors(&geo, &[0, 0], 25);
        assert_eq!(colors[1], Color::new(255, 0, 255));
        assert_eq!(colors[0], Color::new(50, 0, 50));

        // Just off a layer the falloff is partial.
        let colors = frame_colors(&geo, &[0, 0], 3);
        assert_eq!(colors[0].r, 165);
    }

    #[test]
    fn intensity_never_drops_below_floor() {
        let geo = tower();
        for step in 0..NUM_STEPS {
            for color in frame_colors(&geo, &[0, 0], step) {
                assert!(color.r >= 50);
            }
        }
    }

    #[test]
    fn warm_sensor_drains_blue_on_its_faces_only() {
        let geo = tower();
        let colors = frame_colors(&geo, &[255, 0], 0);
        // Face 0 hears sensor 0 at full temperature.
        assert_eq!(colors[0], Color::new(255, 0, 0));
        // Face 1 hears only the cold sensor 1.
        assert_eq!(colors[1].b, colors[1].r);
    }

    #[test]
    fn empty_temperatures_read_as_cold() {
        let geo = tower();
        let colors = frame_colors(&geo, &[], 0);
        assert_eq!(colors[0], Color::new(255, 0, 255));
    }
}
