//! Frame timer.

use std::time::{Duration, Instant};

/// Upper bound on a single simulation step in seconds.
///
/// A window drag or a debugger pause can stall the loop for seconds; feeding
/// that into the orbit and ship integrators would teleport everything.
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Measures total running time and per-frame deltas.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    frames: u64,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frames: 0,
        }
    }

    /// Time since the timer was created or last reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Advance one frame and return the time since the previous tick.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.frames += 1;
        delta
    }

    /// Frame delta in seconds, clamped to [`MAX_FRAME_DELTA`].
    pub fn delta_secs(&mut self) -> f32 {
        clamp_delta(self.tick().as_secs_f32())
    }

    /// Number of ticks since creation or reset.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Average frames per second since creation or reset.
    pub fn average_fps(&self) -> f32 {
        let secs = self.elapsed_secs();
        if secs <= f32::EPSILON {
            0.0
        } else {
            self.frames as f32 / secs
        }
    }

    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
        self.frames = 0;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_delta(secs: f32) -> f32 {
    if secs.is_finite() {
        secs.clamp(0.0, MAX_FRAME_DELTA)
    } else {
        0.0
    }
}
