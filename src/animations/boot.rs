//! Boot indicator
//!
//! A red, green, blue sweep over the whole shape right after startup, so
//! a glance at the sculpture confirms every channel of every pixel works
//! before the first animation takes over.

use crate::hal::{Color, SharedSink};
use anyhow::Result;
use log::info;
use std::time::Duration;

/// Fill the shape with red, green and blue in turn, holding each for
/// `hold`.
pub async fn boot_sweep(sink: &SharedSink, hold: Duration) -> Result<()> {
    info!("running boot sweep");
    for color in [Color::RED, Color::GREEN, Color::BLUE] {
        sink.fill(color)?;
        sink.flush()?;
        tokio::time::sleep(hold).await;
    }
    sink.fill(Color::BLACK)?;
    sink.flush()?;
    Ok(())
}
