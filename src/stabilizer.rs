// src/stabilizer.rs

//! # Gyro Servo Stabilizer
//!
//! The control-loop object. It owns the attitude estimator, the axis
//! controller, the output channels and the loop timers, and borrows the
//! input channel set that the interrupt handlers also write to.
//!
//! Each cycle reads the input pulse as the set point, reads the yaw rate as
//! the measurement, runs one PID step and writes the resulting pulse width
//! to the servo output. The yaw rate enters the controller as a pulse width,
//! one microsecond per degree per second around the neutral width.

use crate::ahrs::{AttitudeEstimator, DEFAULT_CALIBRATION_MS};
use crate::config::ConfigRecord;
use crate::hal::{CaptureControl, Clock, InertialSensor, PwmGenerator};
use crate::pid::AxisController;
use crate::pulse::{PulseInputs, PulseOutputs, DEFAULT_RESOLUTION_BITS};
use crate::telemetry::Signals;
use crate::timing::{LoopTimer, RateCounter};
use crate::Result;

/// Window of the input neutral calibration.
pub const INPUT_CALIBRATION_MS: u32 = 1000;

/// Output microseconds per degree per second of yaw rate.
pub const RATE_TO_USEC: f32 = 1.0;

/// Single-axis gyro stabilizer.
///
/// Example Usage
/// ```
/// use gyro_servo_stabilization::config::ConfigRecord;
/// use gyro_servo_stabilization::hal::{CaptureControl, Clock, InertialSensor, PwmGenerator};
/// use gyro_servo_stabilization::pulse::{PulseInputs, DEFAULT_TIMEOUT_US};
/// use gyro_servo_stabilization::telemetry::Signals;
/// use gyro_servo_stabilization::Stabilizer;
///
/// struct Board(u64);
/// impl Clock for Board {
///     fn now_us(&self) -> u64 {
///         self.0
///     }
///     fn delay_ms(&mut self, ms: u32) {
///         self.0 += u64::from(ms) * 1000;
///     }
/// }
///
/// struct Capture;
/// impl CaptureControl for Capture {
///     fn enable_edge_interrupt(&mut self, _pin: u8, _channel: usize) {}
///     fn disable_edge_interrupt(&mut self, _pin: u8) {}
///     fn start_watchdog(&mut self, _period_ms: u32) {}
///     fn stop_watchdog(&mut self) {}
/// }
///
/// struct StillImu;
/// impl InertialSensor for StillImu {
///     fn read_gyro(&mut self) -> [f32; 3] {
///         [0.0; 3]
///     }
///     fn read_accel(&mut self) -> [f32; 3] {
///         [0.0, 0.0, 1.0]
///     }
/// }
///
/// struct NoPwm;
/// impl PwmGenerator for NoPwm {
///     fn configure(&mut self, _lane: u8, _freq_hz: u32, _resolution_bits: u8) {}
///     fn attach_pin(&mut self, _pin: u8, _lane: u8) {}
///     fn detach_pin(&mut self, _pin: u8) {}
///     fn write_duty(&mut self, _lane: u8, _duty: u32) {}
/// }
///
/// let mut board = Board(0);
/// let mut capture = Capture;
/// let mut inputs = PulseInputs::new();
/// let ch = inputs
///     .setup_in(32, DEFAULT_TIMEOUT_US, 0, &mut capture)
///     .unwrap();
/// let signals = Signals::new();
///
/// let config = ConfigRecord::default();
/// let mut stabilizer = Stabilizer::new(config, &inputs, ch, &signals, StillImu, NoPwm);
/// stabilizer.setup(26, &mut board, &mut capture).unwrap();
///
/// // No input pulse: the output stays disarmed.
/// board.delay_ms(20);
/// assert_eq!(0.0, stabilizer.cycle(board.now_us()).unwrap());
/// ```
pub struct Stabilizer<'a, I: InertialSensor, G: PwmGenerator> {
    config: ConfigRecord,
    inputs: &'a PulseInputs,
    input_ch: usize,
    input_neutral: f32,
    signals: &'a Signals,
    ahrs: AttitudeEstimator<I>,
    axis: AxisController,
    outputs: PulseOutputs<G>,
    output_ch: Option<usize>,
    loop_timer: LoopTimer,
    rate: RateCounter,
}

impl<'a, I: InertialSensor, G: PwmGenerator> Stabilizer<'a, I, G> {
    /// Creates a stabilizer reading input channel `input_ch` of `inputs`.
    ///
    /// Nothing touches hardware until [`setup`](Self::setup).
    pub fn new(
        config: ConfigRecord,
        inputs: &'a PulseInputs,
        input_ch: usize,
        signals: &'a Signals,
        imu: I,
        generator: G,
    ) -> Self {
        Self {
            config,
            inputs,
            input_ch,
            input_neutral: config.mean as f32,
            signals,
            ahrs: AttitudeEstimator::new(imu),
            axis: AxisController::new(),
            outputs: PulseOutputs::new(generator),
            output_ch: None,
            loop_timer: LoopTimer::new(),
            rate: RateCounter::new(),
        }
    }

    /// Brings the stabilizer up. The platform must be still and the
    /// transmitter stick centred. Blocks for the input and sensor
    /// calibrations.
    ///
    /// 1. Starts input capture and records the input neutral.
    /// 2. Binds `output_pin` at the configured rate.
    /// 3. Calibrates the sensor and aligns the body frame.
    /// 4. Tunes the controller from the configuration.
    pub fn setup<K: Clock, C: CaptureControl>(
        &mut self,
        output_pin: u8,
        clock: &mut K,
        ctl: &mut C,
    ) -> Result<()> {
        self.inputs.channel(self.input_ch)?;
        self.inputs.attach(ctl);
        self.inputs.calibrate(INPUT_CALIBRATION_MS, clock);
        let neutral = self.inputs.mean_usec(self.input_ch)?;
        self.input_neutral = if neutral > 0.0 {
            neutral
        } else {
            log_warn!("stabilizer: no input pulse, neutral {} us", self.config.mean);
            self.config.mean as f32
        };

        if self.output_ch.is_none() {
            let ch = self.outputs.setup_out(
                output_pin,
                self.config.loop_freq_hz(),
                DEFAULT_RESOLUTION_BITS,
            )?;
            self.output_ch = Some(ch);
        }

        self.ahrs
            .setup(DEFAULT_CALIBRATION_MS, self.config.axis(), clock);
        self.apply_config(self.config)?;
        self.loop_timer.touch(clock.now_ms());
        log_info!(
            "stabilizer: ready, input neutral {} us, loop {} Hz",
            self.input_neutral,
            self.config.loop_freq_hz()
        );
        Ok(())
    }

    /// Adopts `config`: retunes the controller, changes the output rate if
    /// it moved and realigns the body frame if the axis selector changed.
    pub fn apply_config(&mut self, config: ConfigRecord) -> Result<()> {
        let realign = config.axis() != self.config.axis();
        self.config = config;

        let (kp, ki, kd) = config.gains();
        self.axis.setup(kp, ki, kd, config.limits());

        if let Some(ch) = self.output_ch {
            let freq_hz = config.loop_freq_hz();
            if self.outputs.output_freq(ch)? != freq_hz {
                self.outputs.put_freq(ch, freq_hz)?;
            }
        }
        if realign {
            self.ahrs.align_axes(config.axis());
        }
        log_info!(
            "stabilizer: kp={} ki={} kd={} rev={} axis={}",
            kp,
            ki,
            kd,
            config.rev,
            config.axis()
        );
        Ok(())
    }

    /// Updates one configuration field by key and applies the result.
    ///
    /// Returns `Ok(false)` for an unknown key.
    pub fn set(&mut self, key: &str, value: i32) -> Result<bool> {
        let mut config = self.config;
        if !config.set(key, value) {
            return Ok(false);
        }
        self.apply_config(config)?;
        Ok(true)
    }

    /// Runs a cycle if the loop interval has elapsed.
    ///
    /// Returns the commanded pulse width, or `None` if it was not yet time.
    pub fn poll(&mut self, now_us: u64) -> Result<Option<f32>> {
        if !self
            .loop_timer
            .is_up(self.config.loop_interval_ms(), now_us / 1000)
        {
            return Ok(None);
        }
        self.cycle(now_us).map(Some)
    }

    /// Runs one control step and returns the commanded pulse width.
    ///
    /// A missing input pulse disarms the controller and the output goes
    /// quiet (0 µs).
    pub fn cycle(&mut self, now_us: u64) -> Result<f32> {
        let now_ms = now_us / 1000;
        self.rate.touch(now_ms);

        let usec = self.inputs.get_usec(self.input_ch)?;
        let freq = self.inputs.get_freq(self.input_ch)?;
        let attitude = self.ahrs.update(now_us).unwrap_or_default();
        let yaw_rate = self.ahrs.yaw_rate();

        let mean = self.config.mean as f32;
        let setpoint = if usec > 0 {
            usec as f32 + (mean - self.input_neutral)
        } else {
            0.0
        };
        let sign = if self.config.reversed() { -1.0 } else { 1.0 };
        let measured = mean + sign * yaw_rate * RATE_TO_USEC;

        let command = self.axis.update(setpoint, measured, now_us);
        if let Some(ch) = self.output_ch {
            self.outputs.put_usec(ch, command)?;
        }

        let signals = self.signals;
        signals.ch1_usec.set(usec as f32);
        signals.ch1_freq.set(freq as f32);
        signals.imu_pitch.set(attitude.pitch);
        signals.imu_roll.set(attitude.roll);
        signals.imu_yaw.set(attitude.yaw);
        signals.imu_rate.set(yaw_rate);
        signals.pid_setpoint.set(setpoint);
        signals.pid_usec.set(command);
        signals.pid_freq.set(self.rate.freq(now_ms) as f32);
        Ok(command)
    }

    /// Active configuration.
    pub fn config(&self) -> &ConfigRecord {
        &self.config
    }

    /// Input pulse width treated as stick centre.
    pub fn input_neutral(&self) -> f32 {
        self.input_neutral
    }

    /// Attitude estimator.
    pub fn estimator(&self) -> &AttitudeEstimator<I> {
        &self.ahrs
    }

    /// Mutable attitude estimator, e.g. to recalibrate after remounting.
    pub fn estimator_mut(&mut self) -> &mut AttitudeEstimator<I> {
        &mut self.ahrs
    }

    /// Axis controller.
    pub fn controller(&self) -> &AxisController {
        &self.axis
    }

    /// Output channel set.
    pub fn outputs(&self) -> &PulseOutputs<G> {
        &self.outputs
    }

    /// Output channel index once set up.
    pub fn output_channel(&self) -> Option<usize> {
        self.output_ch
    }

    /// Loop rate measured by the interval timer.
    pub fn loop_freq(&self) -> u32 {
        self.loop_timer.freq()
    }

    /// Cycles counted over the last second.
    pub fn cycle_rate(&self, now_us: u64) -> u32 {
        self.rate.freq(now_us / 1000)
    }

    /// Logs inputs, outputs, the estimator and the controller.
    pub fn log_status(&self) {
        self.inputs.log_status();
        self.outputs.log_status();
        self.ahrs.log_status();
        log_debug!(
            "pid: setpoint={} input={} output={} loop={} (Hz)",
            self.axis.setpoint(),
            self.axis.input(),
            self.axis.output(),
            self.loop_timer.freq()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ahrs::EstimatorState;
    use crate::error::{Error, PulseError};
    use crate::pulse::DEFAULT_TIMEOUT_US;
    use crate::telemetry::{TelemetryRegistry, CH1_USEC, PID_SETPOINT, PID_USEC};
    use crate::test_utils::*;

    const IN_PIN: u8 = 32;
    const OUT_PIN: u8 = 26;

    fn capture() -> (PulseInputs, MockCapture) {
        let mut ctl = MockCapture::new();
        let mut inputs = PulseInputs::new();
        inputs
            .setup_in(IN_PIN, DEFAULT_TIMEOUT_US, 0, &mut ctl)
            .unwrap();
        (inputs, ctl)
    }

    /// One input pulse of `usec`, ending now.
    fn pulse(inputs: &PulseInputs, clock: &MockClock, usec: u32) {
        let now = clock.now_us as u32;
        inputs.on_edge(0, true, now - usec);
        inputs.on_edge(0, false, now);
    }

    fn stabilizer<'a>(
        inputs: &'a PulseInputs,
        signals: &'a Signals,
        clock: &mut MockClock,
        ctl: &mut MockCapture,
        config: ConfigRecord,
    ) -> Stabilizer<'a, MockImu, MockPwm> {
        let mut stab = Stabilizer::new(config, inputs, 0, signals, MockImu::level(), MockPwm::new());
        stab.setup(OUT_PIN, clock, ctl).unwrap();
        stab
    }

    /// Test setup binds the output, calibrates and tunes from the config.
    #[test]
    fn test_stabilizer_setup() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        clock.advance_ms(10);
        let stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, ConfigRecord::default());

        assert_eq!(Some(0), stab.output_channel());
        assert_eq!(Some((50, 16)), stab.outputs().generator().config(0));
        assert_eq!(Some(0), stab.outputs().generator().lane_of(OUT_PIN));
        assert_eq!(EstimatorState::Running, stab.estimator().state());
        assert!(
            value_close(1500.0, stab.input_neutral()),
            "No input, config neutral."
        );

        let (kp, ki, kd) = stab.controller().gains();
        assert!(value_close(0.5, kp));
        assert!(value_close(0.1, ki));
        assert!(value_close(0.05, kd));
        assert_eq!((-500.0, 500.0), stab.controller().bounds());
        stab.log_status();
    }

    /// Test a bad input channel fails setup before touching hardware.
    #[test]
    fn test_stabilizer_invalid_input_channel() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        let mut stab = Stabilizer::new(
            ConfigRecord::default(),
            &inputs,
            3,
            &signals,
            MockImu::level(),
            MockPwm::new(),
        );

        assert_eq!(
            Err(Error::Pulse(PulseError::InvalidChannel(3))),
            stab.setup(OUT_PIN, &mut clock, &mut ctl)
        );
        assert!(stab.outputs().is_empty());
        assert_eq!(0, clock.now_us);
    }

    /// Test a silent transmitter disarms the output.
    #[test]
    fn test_stabilizer_disarmed_without_input() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        let mut stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, ConfigRecord::default());

        clock.advance_ms(20);
        assert_eq!(0.0, stab.cycle(clock.now_us).unwrap());
        assert_eq!(0, stab.outputs().generator().duty(0));
        assert_eq!(0.0, signals.pid_usec.get());
    }

    /// Test a centred stick on a still platform holds neutral.
    #[test]
    fn test_stabilizer_neutral_hold() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        let mut stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, ConfigRecord::default());

        clock.advance_ms(20);
        pulse(&inputs, &clock, 1500);
        let usec = stab.cycle(clock.now_us).unwrap();

        assert!(value_close(1500.0, usec));
        assert_eq!(4915, stab.outputs().generator().duty(0));
        assert!(value_close(1500.0, signals.ch1_usec.get()));
        assert!(value_close(1500.0, signals.pid_setpoint.get()));
    }

    /// Test the input neutral found at setup maps onto the output neutral.
    #[test]
    fn test_stabilizer_input_neutral_offset() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        clock.advance_ms(10);
        pulse(&inputs, &clock, 1520);
        let mut stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, ConfigRecord::default());
        assert!(value_close(1520.0, stab.input_neutral()));

        clock.advance_ms(20);
        pulse(&inputs, &clock, 1520);
        let usec = stab.cycle(clock.now_us).unwrap();
        assert!(value_close(1500.0, usec), "Centred stick, got {}.", usec);
    }

    /// Test the correction opposes rotation, and reverses with REV.
    #[test]
    fn test_stabilizer_counters_rotation() {
        for (rev, above_neutral) in [(1, true), (0, false)] {
            let (inputs, mut ctl) = capture();
            let signals = Signals::new();
            let mut clock = MockClock::new();
            let config = ConfigRecord {
                rev,
                ..ConfigRecord::default()
            };
            let mut stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, config);
            stab.estimator_mut().sensor_mut().gyro = [0.0, 0.0, 100.0];

            clock.advance_ms(20);
            pulse(&inputs, &clock, 1500);
            let usec = stab.cycle(clock.now_us).unwrap();

            assert!((1000.0..=2000.0).contains(&usec), "Out of range: {}.", usec);
            assert_eq!(above_neutral, usec > 1500.0, "REV={} gave {}.", rev, usec);
            assert!(value_close(100.0, signals.imu_rate.get()));
        }
    }

    /// Test polling runs at most one cycle per loop interval.
    #[test]
    fn test_stabilizer_poll_rate() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        let mut stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, ConfigRecord::default());
        let start = clock.now_us;

        let mut cycles = 0;
        for step in 1..=1000u64 {
            if stab.poll(start + step * 1000).unwrap().is_some() {
                cycles += 1;
            }
        }
        assert_eq!(50, cycles);
        assert_eq!(50, stab.loop_freq());
        assert_eq!(None, stab.poll(start + 1_000_500).unwrap());
    }

    /// Test a configuration change retunes and moves the output rate.
    #[test]
    fn test_stabilizer_apply_config() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        let mut stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, ConfigRecord::default());
        let detaches = stab.outputs().generator().detaches;

        assert!(stab.set("FREQ", 100).unwrap());
        assert!(stab.set("MAX", 1800).unwrap());
        assert!(!stab.set("BOGUS", 1).unwrap());

        assert_eq!(Ok(100), stab.outputs().output_freq(0));
        assert_eq!(Some((100, 16)), stab.outputs().generator().config(0));
        assert_eq!(detaches + 1, stab.outputs().generator().detaches);
        assert_eq!((-500.0, 300.0), stab.controller().bounds());
        assert_eq!(10, stab.config().loop_interval_ms());
    }

    /// Test a new axis selector realigns the body frame.
    #[test]
    fn test_stabilizer_axis_change() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        let mut stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, ConfigRecord::default());
        assert!(vector_close([1.0, 0.0, 0.0], stab.estimator().axes().x));

        stab.set("AXIS", 2).unwrap();
        assert!(vector_close([0.0, 1.0, 0.0], stab.estimator().axes().x));
        stab.set("AXIS", 4).unwrap();
        assert!(vector_close([-1.0, 0.0, 0.0], stab.estimator().axes().x));
    }

    /// Test the default signals reach a registry.
    #[test]
    fn test_stabilizer_telemetry() {
        let (inputs, mut ctl) = capture();
        let signals = Signals::new();
        let mut clock = MockClock::new();
        let mut stab = stabilizer(&inputs, &signals, &mut clock, &mut ctl, ConfigRecord::default());
        let mut registry: TelemetryRegistry = TelemetryRegistry::new();
        signals.register_defaults(&mut registry).unwrap();

        clock.advance_ms(20);
        pulse(&inputs, &clock, 1600);
        let usec = stab.cycle(clock.now_us).unwrap();

        assert!(usec > 1500.0, "Stick right should move right, got {}.", usec);
        assert_eq!(Some(usec), registry.read(PID_USEC));
        assert_eq!(Some(1600.0), registry.read(PID_SETPOINT));
        assert!(value_close(1600.0, registry.read(CH1_USEC).unwrap()));
    }
}
