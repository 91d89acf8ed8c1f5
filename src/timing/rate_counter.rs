// src/timing/rate_counter.rs

//! # Rate Counter
//!
//! Counts calls and reports the tally of the last full second.

/// Snapshot window.
const WINDOW_MS: u64 = 1000;

/// A snapshot older than this is reported as zero.
const STALE_MS: u64 = 1100;

/// Calls-per-second counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateCounter {
    last_ms: u64,
    freq_hz: u32,
    count: u32,
}

impl RateCounter {
    /// Creates a counter with an empty tally.
    pub const fn new() -> Self {
        Self {
            last_ms: 0,
            freq_hz: 0,
            count: 0,
        }
    }

    /// Counts one call. Once a full second has elapsed since the last
    /// snapshot, the tally becomes the reported frequency and restarts.
    pub fn touch(&mut self, now_ms: u64) {
        self.count = self.count.saturating_add(1);
        if now_ms.saturating_sub(self.last_ms) >= WINDOW_MS {
            self.last_ms = now_ms;
            self.freq_hz = self.count;
            self.count = 0;
        }
    }

    /// Reported frequency in Hz, or 0 if the last snapshot is stale.
    pub fn freq(&self, now_ms: u64) -> u32 {
        if now_ms.saturating_sub(self.last_ms) > STALE_MS {
            0
        } else {
            self.freq_hz
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test a steady 50 Hz caller is reported as 50 Hz.
    #[test]
    fn test_rate_counter_steady_rate() {
        let mut counter = RateCounter::new();
        // Prime the first snapshot.
        counter.touch(1000);

        for i in 1..=50 {
            counter.touch(1000 + i * 20);
        }

        assert_eq!(50, counter.freq(2000));
    }

    /// Test the tally restarts after each snapshot.
    #[test]
    fn test_rate_counter_restarts() {
        let mut counter = RateCounter::new();
        counter.touch(1000);
        for i in 1..=10 {
            counter.touch(1000 + i * 100);
        }
        assert_eq!(10, counter.freq(2000));

        for i in 1..=4 {
            counter.touch(2000 + i * 250);
        }
        assert_eq!(4, counter.freq(3000));
    }

    /// Test a stalled caller reads as zero after 1.1 s.
    #[test]
    fn test_rate_counter_goes_stale() {
        let mut counter = RateCounter::new();
        counter.touch(1000);
        for i in 1..=20 {
            counter.touch(1000 + i * 50);
        }

        assert_eq!(20, counter.freq(3100));
        assert_eq!(0, counter.freq(3101));
    }
}
