// Blocking delays used by the negotiation
//
// The engine never reads a clock; it only asks the platform to sleep for a
// bounded number of milliseconds between steps.

use smoltcp::time::Duration;

/// Platform sleep primitive
pub trait Delay {
    /// Block for `ms` milliseconds
    fn sleep_ms(&mut self, ms: u64);

    /// Block for a smoltcp duration
    fn sleep(&mut self, duration: Duration) {
        self.sleep_ms(duration.total_millis());
    }
}

/// Busy-wait delay for targets without a configured timer
///
/// Spins `loops_per_ms` times per millisecond. The default is tuned for
/// emulators where `spin_loop` is slow; real hardware needs calibration.
#[derive(Debug, Clone, Copy)]
pub struct SpinDelay {
    loops_per_ms: u64,
}

impl SpinDelay {
    pub const fn new(loops_per_ms: u64) -> Self {
        Self { loops_per_ms }
    }
}

impl Default for SpinDelay {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Delay for SpinDelay {
    fn sleep_ms(&mut self, ms: u64) {
        for _ in 0..ms.saturating_mul(self.loops_per_ms) {
            core::hint::spin_loop();
        }
    }
}

impl<T: Delay + ?Sized> Delay for &mut T {
    fn sleep_ms(&mut self, ms: u64) {
        (**self).sleep_ms(ms)
    }
}

/// Delay that records every requested sleep instead of blocking
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Recorder(pub alloc::vec::Vec<u64>);

#[cfg(test)]
impl Delay for Recorder {
    fn sleep_ms(&mut self, ms: u64) {
        self.0.push(ms);
    }
}
