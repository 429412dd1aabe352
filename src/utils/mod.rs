use std::time::Duration;

pub mod geometry;
mod spawn;

use smithay::reexports::rustix;

pub use spawn::spawn;

/// Reads `CLOCK_MONOTONIC`. Used to timestamp animation starts and frame presentation; we avoid
/// `smithay::utils::Time<Monotonic>` here since plain [`Duration`] arithmetic is what the
/// animation queue actually wants.
pub fn get_monotonic_time() -> Duration {
    let timespec = rustix::time::clock_gettime(rustix::time::ClockId::Monotonic);
    Duration::new(timespec.tv_sec as u64, timespec.tv_nsec as u32)
}
