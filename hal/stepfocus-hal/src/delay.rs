//! Host delay provider
//!
//! Step timing on a single-board computer is plain thread sleeping. The
//! scheduler's sleep granularity and wake-up jitter (typically tens of
//! microseconds on a stock Linux kernel) bound how precisely a step rate is
//! held; that is a property of the host, not something the engine corrects.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

/// `DelayNs` implementation that sleeps the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl StdDelay {
    /// Create a new delay provider
    pub const fn new() -> Self {
        Self
    }
}

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_delay_sleeps_at_least_requested() {
        let mut delay = StdDelay::new();
        let start = Instant::now();
        delay.delay_us(2_000);
        assert!(start.elapsed() >= Duration::from_micros(2_000));
    }
}
