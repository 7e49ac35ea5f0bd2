//! Height-polling convergence detection.
//!
//! Asynchronous work (fonts, embedded documents) can move geometry after
//! the first layout. The driver samples the content height once per frame
//! and only trusts it after it has stayed put for a run of frames.

use std::time::Duration;

/// Samples closer than this count as unchanged.
pub const HEIGHT_TOLERANCE: f64 = 1e-6;

/// Outcome of one height sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Settle {
    /// Keep sampling.
    Pending,
    /// The height held still for the required run.
    Settled(f64),
    /// The frame budget ran out. Carries the last sample.
    GaveUp(f64),
}

/// Bounded run-length detector over height samples.
#[derive(Debug, Clone)]
pub struct Stabilizer {
    required: u32,
    max_frames: u32,
    frames: u32,
    stable_run: u32,
    last: Option<f64>,
}

impl Stabilizer {
    pub fn new(required: u32, max_frames: u32) -> Self {
        Self {
            required,
            max_frames: max_frames.max(1),
            frames: 0,
            stable_run: 0,
            last: None,
        }
    }

    /// Feed one sample.
    pub fn observe(&mut self, height: f64) -> Settle {
        self.frames += 1;
        match self.last {
            Some(previous) if (previous - height).abs() < HEIGHT_TOLERANCE => {
                self.stable_run += 1;
            }
            _ => self.stable_run = 0,
        }
        self.last = Some(height);

        if self.stable_run >= self.required {
            Settle::Settled(height)
        } else if self.frames >= self.max_frames {
            Settle::GaveUp(height)
        } else {
            Settle::Pending
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}

/// Wait for the next frame. A zero interval just yields to the scheduler.
pub async fn next_frame(interval: Duration) {
    if interval.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(interval).await;
    }
}
