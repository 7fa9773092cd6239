use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The audio clock: frames the output stream has rendered so far.
///
/// The stream callback advances it; everyone else only reads. All event
/// timestamps are computed against this clock, never against the wall
/// clock, so jitter in the transport thread's wake-ups cannot move a
/// note, only bound how far ahead notes get handed over.
#[derive(Clone)]
pub struct AudioClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Current time in seconds.
    pub fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Called by the stream callback after rendering a block.
    pub fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::Relaxed);
    }

    /// Convert an absolute time in seconds to a frame index.
    pub fn time_to_frame(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate as f64).round().max(0.0) as u64
    }
}
