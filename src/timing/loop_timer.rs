// src/timing/loop_timer.rs

//! # Interval Timer
//!
//! A resettable millisecond timer that fires at most once per interval and
//! keeps a rolling estimate of how often it fires.

/// Interval timer for the fixed-rate control cycle.
///
/// Example Usage
/// ```
/// use gyro_servo_stabilization::timing::LoopTimer;
///
/// let mut timer = LoopTimer::new();
/// timer.touch(0);
///
/// // 50 Hz cycle, 20 ms interval.
/// assert!(!timer.is_up(20, 19));
/// assert!(timer.is_up(20, 20));
/// assert_eq!(timer.freq(), 50);
///
/// // The reference moved to 20 ms, so this is too early.
/// assert!(!timer.is_up(20, 30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTimer {
    last_ms: u64,
    freq_hz: u32,
}

impl Default for LoopTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopTimer {
    /// Creates a timer referenced at time zero, reporting 1 Hz.
    pub const fn new() -> Self {
        Self {
            last_ms: 0,
            freq_hz: 1,
        }
    }

    /// Returns `true` once `interval_ms` has elapsed since the reference.
    ///
    /// On firing, the frequency estimate becomes `1000 / elapsed` and the
    /// reference moves to `now_ms`.
    pub fn is_up(&mut self, interval_ms: u32, now_ms: u64) -> bool {
        let elapsed = now_ms.saturating_sub(self.last_ms);
        if elapsed < u64::from(interval_ms) {
            return false;
        }
        self.freq_hz = (1000 / elapsed.max(1)) as u32;
        self.last_ms = now_ms;
        true
    }

    /// Returns `true` if `interval_ms` has elapsed, without side effects.
    pub fn is_old(&self, interval_ms: u32, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_ms) >= u64::from(interval_ms)
    }

    /// Moves the reference to `now_ms` without firing.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_ms = now_ms;
    }

    /// Last frequency estimate in Hz.
    pub fn freq(&self) -> u32 {
        self.freq_hz
    }

    /// Milliseconds elapsed since the reference.
    pub fn delta(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the timer fires once per interval and resets its reference.
    #[test]
    fn test_loop_timer_fires_once_per_interval() {
        let mut timer = LoopTimer::new();
        timer.touch(1000);

        assert!(!timer.is_up(20, 1010), "Timer should not fire early.");
        assert!(timer.is_up(20, 1020), "Timer should fire at the interval.");
        assert!(!timer.is_up(20, 1020), "Timer should not fire twice.");
        assert!(timer.is_up(20, 1045), "Timer should fire after a late call.");
        assert_eq!(40, timer.freq(), "Frequency should follow the 25 ms gap.");
    }

    /// Test that is_old has no side effects.
    #[test]
    fn test_loop_timer_is_old_is_pure() {
        let mut timer = LoopTimer::new();
        timer.touch(100);

        assert!(!timer.is_old(50, 149));
        assert!(timer.is_old(50, 150));
        assert!(timer.is_old(50, 150));
        assert_eq!(50, timer.delta(150));
        assert_eq!(1, timer.freq(), "is_old should not touch the estimate.");
    }

    /// Test touch postpones firing.
    #[test]
    fn test_loop_timer_touch_postpones() {
        let mut timer = LoopTimer::new();
        timer.touch(0);
        timer.touch(15);

        assert!(!timer.is_up(20, 30), "Touch should move the reference.");
        assert!(timer.is_up(20, 35));
    }

    /// Test a zero interval never divides by zero.
    #[test]
    fn test_loop_timer_zero_interval() {
        let mut timer = LoopTimer::new();
        timer.touch(10);

        assert!(timer.is_up(0, 10));
        assert_eq!(1000, timer.freq());
    }

    /// Test a clock that appears to run backwards is treated as no elapsed time.
    #[test]
    fn test_loop_timer_backwards_clock() {
        let mut timer = LoopTimer::new();
        timer.touch(500);

        assert!(!timer.is_up(20, 400));
        assert_eq!(0, timer.delta(400));
    }
}
