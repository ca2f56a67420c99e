//! LED sink collaborator
//!
//! Animations paint pixels into a sink and push a complete frame with
//! `flush()`, once per frame. The sink behind the handle is exclusive to
//! the single running animation task; the supervisor guarantees that by
//! never starting a replacement before the previous task has stopped.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, PoisonError};

/// One RGB pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const RED: Color = Color::new(255, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const BLUE: Color = Color::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale all channels by `factor`, clamped to `[0, 1]`.
    pub fn scaled(self, factor: f32) -> Self {
        let f = factor.clamp(0.0, 1.0);
        Self {
            r: (self.r as f32 * f) as u8,
            g: (self.g as f32 * f) as u8,
            b: (self.b as f32 * f) as u8,
        }
    }
}

impl From<[u8; 3]> for Color {
    fn from(v: [u8; 3]) -> Self {
        Color::new(v[0], v[1], v[2])
    }
}

/// Addressable LED string, one pixel per index.
///
/// `flush()` pushes the complete frame buffer to hardware; the runtime
/// calls it exactly once per produced frame.
pub trait LedSink: Send {
    /// Number of addressable pixels.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set one pixel in the frame buffer. Out-of-range indices are ignored.
    fn set_pixel(&mut self, index: usize, color: Color);

    /// Push the frame buffer to the hardware.
    fn flush(&mut self) -> Result<()>;
}

#[derive(Default)]
struct MemoryFrames {
    buffer: Vec<Color>,
    flushed: Vec<Color>,
    flush_count: u64,
}

/// In-memory sink used by the demo binary and the test suite.
///
/// Remembers the last flushed frame and counts flushes; `probe()` hands
/// out a cloneable read-side so tests can observe frames after the sink
/// itself has been moved behind a [`SharedSink`].
pub struct MemorySink {
    frames: Arc<Mutex<MemoryFrames>>,
}

/// Read-side view of a [`MemorySink`].
#[derive(Clone)]
pub struct MemoryProbe {
    frames: Arc<Mutex<MemoryFrames>>,
}

impl MemorySink {
    pub fn new(len: usize) -> Self {
        Self {
            frames: Arc::new(Mutex::new(MemoryFrames {
                buffer: vec![Color::BLACK; len],
                flushed: vec![Color::BLACK; len],
                flush_count: 0,
            })),
        }
    }

    pub fn probe(&self) -> MemoryProbe {
        MemoryProbe {
            frames: self.frames.clone(),
        }
    }
}

impl MemoryProbe {
    /// The frame most recently pushed with `flush()`.
    pub fn last_frame(&self) -> Vec<Color> {
        let frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames.flushed.clone()
    }

    pub fn flush_count(&self) -> u64 {
        let frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames.flush_count
    }
}

impl LedSink for MemorySink {
    fn len(&self) -> usize {
        let frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames.buffer.len()
    }

    fn set_pixel(&mut self, index: usize, color: Color) {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(px) = frames.buffer.get_mut(index) {
            *px = color;
        }
    }

    fn flush(&mut self) -> Result<()> {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = frames.buffer.clone();
        frames.flushed = buffer;
        frames.flush_count += 1;
        log::trace!("flushed frame {}", frames.flush_count);
        Ok(())
    }
}

/// Cloneable handle to the single LED sink.
///
/// The lock is only held for the duration of one `paint` closure, never
/// across a suspension point, so the critical section stays bounded.
#[derive(Clone)]
pub struct SharedSink {
    inner: Arc<Mutex<Box<dyn LedSink>>>,
}

impl SharedSink {
    pub fn new(sink: impl LedSink + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(sink))),
        }
    }

    /// Run `f` with exclusive access to the sink.
    pub fn paint<R>(&self, f: impl FnOnce(&mut dyn LedSink) -> R) -> Result<R> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|e| anyhow!("LED sink lock poisoned: {}", e))?;
        Ok(f(guard.as_mut()))
    }

    /// Set every pixel to `color` without flushing.
    pub fn fill(&self, color: Color) -> Result<()> {
        self.paint(|sink| {
            for i in 0..sink.len() {
                sink.set_pixel(i, color);
            }
        })
    }

    /// Push the current frame buffer to hardware.
    pub fn flush(&self) -> Result<()> {
        self.paint(|sink| sink.flush())?
    }
}
