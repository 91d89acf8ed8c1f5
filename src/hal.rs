// src/hal.rs

//! # Hardware Seams
//!
//! Traits implemented by the board layer. The control core never touches a
//! peripheral directly; it goes through these so that it can run on any
//! microcontroller and under host tests with mocks.

/// Monotonic time source with a blocking delay.
pub trait Clock {
    /// Microseconds since boot. May wrap; callers use wrapping arithmetic.
    fn now_us(&self) -> u64;

    /// Block for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Milliseconds since boot.
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }
}

/// Six-axis inertial sensor in the sensor's own frame.
pub trait InertialSensor {
    /// Angular rate in degrees per second.
    fn read_gyro(&mut self) -> [f32; 3];

    /// Specific force in g. At rest this points away from the ground.
    fn read_accel(&mut self) -> [f32; 3];

    /// Die temperature in degrees Celsius.
    fn read_temperature(&mut self) -> f32 {
        0.0
    }
}

/// Multi-lane PWM signal generator.
///
/// Frequency and resolution belong to a lane as a pair. Reconfiguring a lane
/// requires releasing its pin first.
pub trait PwmGenerator {
    /// Configure a lane's carrier frequency and duty resolution.
    fn configure(&mut self, lane: u8, freq_hz: u32, resolution_bits: u8);

    /// Route a lane to an output pin.
    fn attach_pin(&mut self, pin: u8, lane: u8);

    /// Release an output pin from its lane.
    fn detach_pin(&mut self, pin: u8);

    /// Set a lane's duty count.
    fn write_duty(&mut self, lane: u8, duty: u32);
}

/// Control over edge-capture interrupts and the watchdog ticker.
pub trait CaptureControl {
    /// Enable both-edge interrupts on `pin`, tagged with `channel`.
    fn enable_edge_interrupt(&mut self, pin: u8, channel: usize);

    /// Disable edge interrupts on `pin`.
    fn disable_edge_interrupt(&mut self, pin: u8);

    /// Start the periodic watchdog ticker.
    fn start_watchdog(&mut self, period_ms: u32);

    /// Stop the watchdog ticker.
    fn stop_watchdog(&mut self);
}
