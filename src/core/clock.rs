use std::time::Instant;

use crate::frame::FrameInfo;

/// Longest delta handed to a frame; longer gaps (window hidden, debugger) are clamped
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Frame clock - numbers frames and tracks delta time
#[derive(Debug)]
pub struct Clock {
    last_tick: Instant,
    frame: u64,
}

impl Clock {
    /// Create new clock starting now
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            frame: 0,
        }
    }

    /// Advance to the next frame
    pub fn tick(&mut self) -> FrameInfo {
        let now = Instant::now();
        let delta = now
            .duration_since(self.last_tick)
            .as_secs_f32()
            .min(MAX_FRAME_DELTA);
        self.last_tick = now;

        let info = FrameInfo::new(self.frame, delta);
        self.frame += 1;
        info
    }

    /// Restart delta measurement from now, keeping the frame count
    pub fn reset(&mut self) {
        self.last_tick = Instant::now();
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
