use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Sum of clamped `dt` since the clock started; drives animations.
    pub elapsed: f32,
    pub frame_index: u64,
}

/// Produces [`FrameTime`] snapshots, one clock per window.
///
/// Delta time is clamped so a stall (debugger, minimized window) does not
/// produce a huge animation step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    elapsed: f32,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::with_clamps(Duration::from_micros(100), Duration::from_millis(250))
    }

    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            elapsed: 0.0,
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Advances the clock by the wall time since the last tick.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last);
        self.last = now;
        self.advance(dt)
    }

    /// Advances the clock by `dt` (clamped). Used by `tick` and by offline rendering.
    pub fn advance(&mut self, dt: Duration) -> FrameTime {
        let dt = dt.clamp(self.dt_min, self.dt_max).as_secs_f32();
        self.elapsed += dt;
        let ft = FrameTime {
            dt,
            elapsed: self.elapsed,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn advance_clamps_and_accumulates() {
        let mut clock = FrameClock::new();
        let a = clock.advance(Duration::from_secs(5));
        assert_abs_diff_eq!(a.dt, 0.25);
        let b = clock.advance(Duration::ZERO);
        assert_abs_diff_eq!(b.dt, 0.0001, epsilon = 1e-7);
        assert_abs_diff_eq!(b.elapsed, 0.2501, epsilon = 1e-6);
        assert_eq!((a.frame_index, b.frame_index), (0, 1));
    }
}
