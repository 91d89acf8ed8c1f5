// src/pulse/output.rs

//! # Pulse Generation
//!
//! Servo-style PWM outputs on a multi-lane signal generator. Lanes come in
//! pairs that share a timer, so each logical channel takes the even lane of
//! its own pair; reconfiguring one channel never glitches another.

use super::MAX_CHANNELS;
use crate::error::PulseError;
use crate::hal::PwmGenerator;
use heapless::Vec;

/// Default servo frame rate.
pub const DEFAULT_OUTPUT_FREQ_HZ: u32 = 50;

/// Default duty resolution.
pub const DEFAULT_RESOLUTION_BITS: u8 = 16;

/// Generation state for one output pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseChannelOut {
    /// Output pin.
    pub pin: u8,
    /// Generator lane driving the pin.
    pub lane: u8,
    /// Carrier frequency in Hz.
    pub freq_hz: u32,
    /// Duty resolution in bits.
    pub resolution_bits: u8,
    /// Duty count of a 100% pulse.
    pub full_scale: u32,
    /// Carrier period in microseconds.
    pub period_us: u32,
    /// Last commanded pulse width in microseconds.
    pub usec: f32,
}

impl PulseChannelOut {
    fn new(pin: u8, lane: u8, freq_hz: u32, resolution_bits: u8) -> Self {
        let bits = resolution_bits.min(31);
        let freq_hz = freq_hz.max(1);
        Self {
            pin,
            lane,
            freq_hz,
            resolution_bits: bits,
            full_scale: 1u32 << bits,
            period_us: 1_000_000 / freq_hz,
            usec: 0.0,
        }
    }

    /// Duty count for a pulse of `usec`, clamped to the register range.
    pub fn duty_for(&self, usec: f32) -> u32 {
        let period = self.period_us as f32;
        let usec = usec.clamp(0.0, period);
        let duty = (usec * self.full_scale as f32 / period) as u32;
        duty.min(self.full_scale - 1)
    }
}

/// Fixed-capacity set of PWM output channels on one generator.
#[derive(Debug)]
pub struct PulseOutputs<G: PwmGenerator> {
    generator: G,
    channels: Vec<PulseChannelOut, MAX_CHANNELS>,
}

impl<G: PwmGenerator> PulseOutputs<G> {
    /// Creates an empty channel set driving `generator`.
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            channels: Vec::new(),
        }
    }

    /// Binds `pin` to the next free channel. The output starts idle (0 duty).
    pub fn setup_out(
        &mut self,
        pin: u8,
        freq_hz: u32,
        resolution_bits: u8,
    ) -> Result<usize, PulseError> {
        let ch = self.channels.len();
        let out = PulseChannelOut::new(pin, Self::lane(ch), freq_hz, resolution_bits);
        if self.channels.push(out).is_err() {
            log_warn!("pulse out: no free slot for pin {}", pin);
            return Err(PulseError::CapacityExhausted);
        }

        self.generator
            .configure(out.lane, out.freq_hz, out.resolution_bits);
        self.generator.write_duty(out.lane, 0);
        self.generator.attach_pin(out.pin, out.lane);
        log_info!(
            "pulse out {}: pin {} freq {} Hz bits {} period {} us",
            ch,
            pin,
            out.freq_hz,
            out.resolution_bits,
            out.period_us
        );
        Ok(ch)
    }

    /// Commands a pulse of `usec` microseconds on `ch`.
    ///
    /// The width maps linearly from `[0, period]` to `[0, full scale]`.
    pub fn put_usec(&mut self, ch: usize, usec: f32) -> Result<(), PulseError> {
        let out = self
            .channels
            .get_mut(ch)
            .ok_or(PulseError::InvalidChannel(ch))?;
        let duty = out.duty_for(usec);
        self.generator.write_duty(out.lane, duty);
        out.usec = usec;
        Ok(())
    }

    /// Changes the carrier frequency of `ch`.
    ///
    /// The lane is idled and released, reconfigured, then rebound. The last
    /// commanded width is not restored; the next [`put_usec`](Self::put_usec)
    /// applies it at the new period.
    pub fn put_freq(&mut self, ch: usize, freq_hz: u32) -> Result<(), PulseError> {
        let out = self
            .channels
            .get_mut(ch)
            .ok_or(PulseError::InvalidChannel(ch))?;
        *out = PulseChannelOut {
            usec: out.usec,
            ..PulseChannelOut::new(out.pin, out.lane, freq_hz, out.resolution_bits)
        };

        self.generator.write_duty(out.lane, 0);
        self.generator.detach_pin(out.pin);
        self.generator
            .configure(out.lane, out.freq_hz, out.resolution_bits);
        self.generator.write_duty(out.lane, 0);
        self.generator.attach_pin(out.pin, out.lane);
        log_info!("pulse out {}: freq {} Hz", ch, out.freq_hz);
        Ok(())
    }

    /// Channel record for `ch`.
    pub fn channel(&self, ch: usize) -> Result<&PulseChannelOut, PulseError> {
        self.channels.get(ch).ok_or(PulseError::InvalidChannel(ch))
    }

    /// Last commanded pulse width of `ch` in microseconds.
    pub fn output_usec(&self, ch: usize) -> Result<f32, PulseError> {
        self.channel(ch).map(|out| out.usec)
    }

    /// Carrier frequency of `ch` in Hz.
    pub fn output_freq(&self, ch: usize) -> Result<u32, PulseError> {
        self.channel(ch).map(|out| out.freq_hz)
    }

    /// Number of bound channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if no channel is bound.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Borrow the underlying generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Logs every channel's current command.
    pub fn log_status(&self) {
        for (ch, out) in self.channels.iter().enumerate() {
            log_debug!(
                "out({}): pin={} pulse={} (usec) freq={} (Hz)",
                ch,
                out.pin,
                out.usec,
                out.freq_hz
            );
        }
    }

    fn lane(ch: usize) -> u8 {
        (ch * 2) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    /// Test that duty values scale linearly with pulse width at 50 Hz/16-bit.
    #[test]
    fn test_pulse_out_duty_ratio() {
        let mut outputs = PulseOutputs::new(MockPwm::new());
        let ch = outputs.setup_out(22, 50, 16).unwrap();

        outputs.put_usec(ch, 1000.0).unwrap();
        let low = outputs.generator().duty(0);
        outputs.put_usec(ch, 2000.0).unwrap();
        let high = outputs.generator().duty(0);

        assert_eq!(3276, low);
        assert!(
            (high as f32 / low as f32 - 2.0).abs() < 1e-3,
            "Duty should double with the pulse width."
        );
        assert!(value_close(2000.0, outputs.output_usec(ch).unwrap()));
    }

    /// Test widths beyond one carrier period saturate.
    #[test]
    fn test_pulse_out_clamps() {
        let mut outputs = PulseOutputs::new(MockPwm::new());
        let ch = outputs.setup_out(22, 50, 16).unwrap();

        outputs.put_usec(ch, 25_000.0).unwrap();
        assert_eq!(65535, outputs.generator().duty(0), "Full period stays in range.");
        outputs.put_usec(ch, 20_000.0).unwrap();
        assert_eq!(65535, outputs.generator().duty(0));
        outputs.put_usec(ch, -10.0).unwrap();
        assert_eq!(0, outputs.generator().duty(0));
    }

    /// Test channels take even lanes so pairs never share a timer.
    #[test]
    fn test_pulse_out_even_lanes() {
        let mut outputs = PulseOutputs::new(MockPwm::new());
        let a = outputs.setup_out(22, 50, 16).unwrap();
        let b = outputs.setup_out(19, 50, 16).unwrap();

        assert_eq!(0, outputs.channel(a).unwrap().lane);
        assert_eq!(2, outputs.channel(b).unwrap().lane);
        assert_eq!(Some(0), outputs.generator().lane_of(22));
        assert_eq!(Some(2), outputs.generator().lane_of(19));
    }

    /// Test a frequency change releases and rebinds the lane.
    #[test]
    fn test_pulse_out_put_freq() {
        let mut outputs = PulseOutputs::new(MockPwm::new());
        let a = outputs.setup_out(22, 50, 16).unwrap();
        let b = outputs.setup_out(19, 50, 16).unwrap();
        outputs.put_usec(b, 1500.0).unwrap();
        let b_duty = outputs.generator().duty(2);

        outputs.put_freq(a, 200).unwrap();

        let out = outputs.channel(a).unwrap();
        assert_eq!(200, out.freq_hz);
        assert_eq!(5000, out.period_us);
        assert_eq!(Some((200, 16)), outputs.generator().config(0));
        assert_eq!(1, outputs.generator().detaches);
        assert_eq!(Some(0), outputs.generator().lane_of(22));
        assert_eq!(b_duty, outputs.generator().duty(2), "Other lane untouched.");

        outputs.put_usec(a, 1000.0).unwrap();
        assert_eq!(13107, outputs.generator().duty(0));
    }

    /// Test out-of-range channels are rejected without touching hardware.
    #[test]
    fn test_pulse_out_invalid_channel() {
        let mut outputs = PulseOutputs::new(MockPwm::new());
        outputs.setup_out(22, 50, 16).unwrap();
        let writes = outputs.generator().writes;

        assert_eq!(
            Err(PulseError::InvalidChannel(1)),
            outputs.put_usec(1, 1500.0)
        );
        assert_eq!(Err(PulseError::InvalidChannel(5)), outputs.put_freq(5, 100));
        assert_eq!(Err(PulseError::InvalidChannel(2)), outputs.output_freq(2));
        assert_eq!(writes, outputs.generator().writes);
    }

    /// Test the channel set is bounded.
    #[test]
    fn test_pulse_out_capacity() {
        let mut outputs = PulseOutputs::new(MockPwm::new());
        for pin in 0..MAX_CHANNELS as u8 {
            assert!(outputs.setup_out(pin, 50, 16).is_ok());
        }
        assert_eq!(
            Err(PulseError::CapacityExhausted),
            outputs.setup_out(30, 50, 16)
        );
        assert_eq!(MAX_CHANNELS, outputs.len());
    }
}
