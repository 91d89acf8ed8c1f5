// src/pulse/input.rs

//! # Pulse Capture
//!
//! Measures RC-style PWM pulses from both-edge pin interrupts. The edge
//! handler and the watchdog sweep run in interrupt context; the main loop
//! only reads. Every cross-context field is an atomic, so a reader never sees
//! a torn value and no lock is taken anywhere.

use super::MAX_CHANNELS;
use crate::error::PulseError;
use crate::hal::{CaptureControl, Clock};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use heapless::Vec;

/// Default watchdog window, a little over one 50 Hz frame.
pub const DEFAULT_TIMEOUT_US: u32 = 21_000;

/// Sampling period of the neutral calibration.
const CALIBRATION_STEP_MS: u32 = 5;

/// Capture state for one input pin.
#[derive(Debug)]
pub struct PulseChannelIn {
    pin: u8,
    timeout_us: u32,
    high: AtomicBool,
    last_edge_us: AtomicU32,
    last_rise_us: AtomicU32,
    width_us: AtomicU32,
    freq_hz: AtomicU32,
    neutral_bits: AtomicU32,
}

impl PulseChannelIn {
    fn new(pin: u8, timeout_us: u32, now_us: u32) -> Self {
        Self {
            pin,
            timeout_us,
            high: AtomicBool::new(false),
            last_edge_us: AtomicU32::new(now_us),
            last_rise_us: AtomicU32::new(now_us),
            width_us: AtomicU32::new(0),
            freq_hz: AtomicU32::new(0),
            neutral_bits: AtomicU32::new(0),
        }
    }

    /// Input pin.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Watchdog window in microseconds.
    pub fn timeout_us(&self) -> u32 {
        self.timeout_us
    }

    /// Last measured pulse width in microseconds, 0 when stale.
    pub fn width_us(&self) -> u32 {
        self.width_us.load(Ordering::Acquire)
    }

    /// Last measured pulse frequency in Hz, 0 when stale.
    pub fn freq_hz(&self) -> u32 {
        self.freq_hz.load(Ordering::Acquire)
    }

    fn edge(&self, level_high: bool, now_us: u32) {
        let was_high = self.high.load(Ordering::Relaxed);
        if !was_high && level_high {
            let period = now_us.wrapping_sub(self.last_rise_us.load(Ordering::Relaxed));
            let freq = if period == 0 { 0 } else { 1_000_000 / period };
            self.high.store(true, Ordering::Relaxed);
            self.last_rise_us.store(now_us, Ordering::Relaxed);
            self.freq_hz.store(freq, Ordering::Release);
            self.last_edge_us.store(now_us, Ordering::Release);
        } else if was_high && !level_high {
            let width = now_us.wrapping_sub(self.last_edge_us.load(Ordering::Relaxed));
            self.high.store(false, Ordering::Relaxed);
            self.width_us.store(width, Ordering::Release);
            self.last_edge_us.store(now_us, Ordering::Release);
        }
    }

    fn halt(&self) {
        self.high.store(false, Ordering::Relaxed);
        self.width_us.store(0, Ordering::Release);
        self.freq_hz.store(0, Ordering::Release);
    }

    fn expire(&self, now_us: u32) {
        let last = self.last_edge_us.load(Ordering::Acquire);
        // Signed so an edge racing ahead of `now_us` never counts as stale.
        let elapsed = now_us.wrapping_sub(last) as i32;
        if elapsed > self.timeout_us as i32 {
            self.width_us.store(0, Ordering::Release);
            self.freq_hz.store(0, Ordering::Release);
        }
    }
}

/// Fixed-capacity set of captured input channels.
///
/// Bind channels with [`setup_in`](Self::setup_in) during setup, then share
/// the set by reference with the interrupt handlers, which call
/// [`on_edge`](Self::on_edge) and [`sweep`](Self::sweep).
#[derive(Debug, Default)]
pub struct PulseInputs {
    channels: Vec<PulseChannelIn, MAX_CHANNELS>,
    watching: AtomicBool,
}

impl PulseInputs {
    /// Creates an empty channel set.
    pub const fn new() -> Self {
        Self {
            channels: Vec::new(),
            watching: AtomicBool::new(false),
        }
    }

    /// Binds `pin` to the next free channel and starts capturing it.
    ///
    /// The first channel's timeout also sets the watchdog ticker period.
    pub fn setup_in<C: CaptureControl>(
        &mut self,
        pin: u8,
        timeout_us: u32,
        now_us: u32,
        ctl: &mut C,
    ) -> Result<usize, PulseError> {
        let ch = self.channels.len();
        if self
            .channels
            .push(PulseChannelIn::new(pin, timeout_us, now_us))
            .is_err()
        {
            log_warn!("pulse in: no free slot for pin {}", pin);
            return Err(PulseError::CapacityExhausted);
        }

        ctl.enable_edge_interrupt(pin, ch);
        if ch == 0 {
            ctl.start_watchdog(Self::watchdog_period_ms(timeout_us));
        }
        self.watching.store(true, Ordering::Release);
        log_info!("pulse in {}: pin {} timeout {} us", ch, pin, timeout_us);
        Ok(ch)
    }

    /// Edge interrupt entry point. `level_high` is the pin level read in the
    /// handler. Unknown channels are ignored.
    pub fn on_edge(&self, ch: usize, level_high: bool, now_us: u32) {
        if let Some(channel) = self.channels.get(ch) {
            channel.edge(level_high, now_us);
        }
    }

    /// Watchdog ticker entry point. Zeroes width and frequency of every
    /// channel that saw no edge within its timeout window.
    pub fn sweep(&self, now_us: u32) {
        for channel in self.channels.iter() {
            channel.expire(now_us);
        }
    }

    /// Pulse width of `ch` in microseconds.
    pub fn get_usec(&self, ch: usize) -> Result<u32, PulseError> {
        self.channel(ch).map(PulseChannelIn::width_us)
    }

    /// Pulse frequency of `ch` in Hz.
    pub fn get_freq(&self, ch: usize) -> Result<u32, PulseError> {
        self.channel(ch).map(PulseChannelIn::freq_hz)
    }

    /// Neutral pulse width of `ch` found by the last [`calibrate`](Self::calibrate).
    pub fn mean_usec(&self, ch: usize) -> Result<f32, PulseError> {
        self.channel(ch)
            .map(|channel| f32::from_bits(channel.neutral_bits.load(Ordering::Acquire)))
    }

    /// Channel record for `ch`.
    pub fn channel(&self, ch: usize) -> Result<&PulseChannelIn, PulseError> {
        self.channels.get(ch).ok_or(PulseError::InvalidChannel(ch))
    }

    /// Number of bound channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if no channel is bound.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns `true` while interrupts and the watchdog are running.
    pub fn is_watching(&self) -> bool {
        self.watching.load(Ordering::Acquire)
    }

    /// Resumes capture on every bound channel. Does nothing if already running.
    pub fn attach<C: CaptureControl>(&self, ctl: &mut C) {
        if self.channels.is_empty() || self.is_watching() {
            return;
        }
        for (ch, channel) in self.channels.iter().enumerate() {
            ctl.enable_edge_interrupt(channel.pin, ch);
        }
        ctl.start_watchdog(Self::watchdog_period_ms(self.channels[0].timeout_us));
        self.watching.store(true, Ordering::Release);
        log_debug!("pulse in: attached");
    }

    /// Halts capture on every bound channel and zeroes their readings.
    /// Does nothing if already halted.
    pub fn detach<C: CaptureControl>(&self, ctl: &mut C) {
        if self.channels.is_empty() || !self.is_watching() {
            return;
        }
        ctl.stop_watchdog();
        for channel in self.channels.iter() {
            ctl.disable_edge_interrupt(channel.pin);
            channel.halt();
        }
        self.watching.store(false, Ordering::Release);
        log_debug!("pulse in: detached");
    }

    /// Samples every channel each 5 ms for `window_ms` and stores the mean
    /// pulse width as that channel's neutral. Blocks for the whole window.
    ///
    /// Returns the number of samples taken.
    pub fn calibrate<K: Clock>(&self, window_ms: u32, clock: &mut K) -> u32 {
        let mut sums = [0.0f32; MAX_CHANNELS];
        let mut count = 0u32;
        let deadline = clock.now_ms() + u64::from(window_ms);

        while clock.now_ms() < deadline {
            for (sum, channel) in sums.iter_mut().zip(self.channels.iter()) {
                *sum += channel.width_us() as f32;
            }
            count += 1;
            clock.delay_ms(CALIBRATION_STEP_MS);
        }

        for (ch, (sum, channel)) in sums.iter().zip(self.channels.iter()).enumerate() {
            let mean = if count == 0 { 0.0 } else { sum / count as f32 };
            channel.neutral_bits.store(mean.to_bits(), Ordering::Release);
            log_info!("pulse in {}: neutral {} us over {} samples", ch, mean, count);
        }
        count
    }

    /// Logs every channel's current reading.
    pub fn log_status(&self) {
        for (ch, channel) in self.channels.iter().enumerate() {
            log_debug!(
                "in({}): pin={} pulse={} (usec) freq={} (Hz)",
                ch,
                channel.pin,
                channel.width_us(),
                channel.freq_hz()
            );
        }
    }

    fn watchdog_period_ms(timeout_us: u32) -> u32 {
        (timeout_us / 1000).max(1)
    }
}
