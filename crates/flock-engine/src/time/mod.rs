//! Frame timing: one `FrameClock` per window, `tick()` once per frame.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
