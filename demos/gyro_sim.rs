// demos/gyro_sim.rs

use gyro_servo_stabilization::config::ConfigRecord;
use gyro_servo_stabilization::hal::{CaptureControl, Clock, InertialSensor, PwmGenerator};
use gyro_servo_stabilization::pulse::{PulseInputs, DEFAULT_TIMEOUT_US};
use gyro_servo_stabilization::telemetry::{Signals, TelemetryRegistry};
use gyro_servo_stabilization::Stabilizer;
use std::cell::Cell;
use std::rc::Rc;

const INPUT_PIN: u8 = 32;
const OUTPUT_PIN: u8 = 26;

/// Yaw rate, in deg/s, per microsecond of servo deflection.
const PLANT_GAIN: f32 = -0.5;
/// Plant time constant in seconds.
const PLANT_TAU: f32 = 0.15;

struct SimClock(Rc<Cell<u64>>);

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.0.get()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.set(self.0.get() + u64::from(ms) * 1000);
    }
}

struct SimImu(Rc<Cell<f32>>);

impl InertialSensor for SimImu {
    fn read_gyro(&mut self) -> [f32; 3] {
        [0.0, 0.0, self.0.get()]
    }

    fn read_accel(&mut self) -> [f32; 3] {
        [0.0, 0.0, 1.0]
    }

    fn read_temperature(&mut self) -> f32 {
        30.0
    }
}

struct SimPwm(Rc<Cell<u32>>);

impl PwmGenerator for SimPwm {
    fn configure(&mut self, _lane: u8, _freq_hz: u32, _resolution_bits: u8) {}

    fn attach_pin(&mut self, _pin: u8, _lane: u8) {}

    fn detach_pin(&mut self, _pin: u8) {}

    fn write_duty(&mut self, _lane: u8, duty: u32) {
        self.0.set(duty);
    }
}

struct SimCapture;

impl CaptureControl for SimCapture {
    fn enable_edge_interrupt(&mut self, _pin: u8, _channel: usize) {}

    fn disable_edge_interrupt(&mut self, _pin: u8) {}

    fn start_watchdog(&mut self, _period_ms: u32) {}

    fn stop_watchdog(&mut self) {}
}

/// Feeds one receiver frame of `usec` ending at `now_us`.
fn receiver_frame(inputs: &PulseInputs, ch: usize, usec: u32, now_us: u64) {
    let now = now_us as u32;
    inputs.on_edge(ch, true, now.wrapping_sub(usec));
    inputs.on_edge(ch, false, now);
}

fn main() {
    let time = Rc::new(Cell::new(0u64));
    let yaw_rate = Rc::new(Cell::new(0.0f32));
    let duty = Rc::new(Cell::new(0u32));

    let mut clock = SimClock(time.clone());
    let mut capture = SimCapture;

    let mut inputs = PulseInputs::new();
    let ch = inputs
        .setup_in(INPUT_PIN, DEFAULT_TIMEOUT_US, 0, &mut capture)
        .expect("input channel");
    let signals = Signals::new();
    let mut registry: TelemetryRegistry = TelemetryRegistry::new();
    signals
        .register_defaults(&mut registry)
        .expect("telemetry registry");

    let mut stabilizer = Stabilizer::new(
        ConfigRecord::default(),
        &inputs,
        ch,
        &signals,
        SimImu(yaw_rate.clone()),
        SimPwm(duty.clone()),
    );

    // Centred stick during setup.
    receiver_frame(&inputs, ch, 1500, clock.now_us());
    stabilizer
        .setup(OUTPUT_PIN, &mut clock, &mut capture)
        .expect("stabilizer setup");

    let period_us = 1_000_000 / u64::from(stabilizer.config().loop_freq_hz());
    let start_us = clock.now_us();
    let dt = 0.001f32;

    println!("    t,  stick,   gust,    rate,  servo");
    for step in 0..=3000u64 {
        let now_us = start_us + step * 1000;
        time.set(now_us);
        let t = step as f32 * dt;

        let stick = if t < 1.0 { 1500 } else { 1600 };
        if step % 20 == 0 {
            receiver_frame(&inputs, ch, stick, now_us);
        }
        inputs.sweep(now_us as u32);

        stabilizer.poll(now_us).expect("control cycle");

        // Servo deflection turns the airframe; a gust pushes it from 1.5 s.
        let servo_usec = duty.get() as f32 * period_us as f32 / 65536.0;
        let deflection = if servo_usec > 0.0 {
            servo_usec - 1500.0
        } else {
            0.0
        };
        let gust = if (1.5..2.0).contains(&t) { 60.0 } else { 0.0 };
        let target = gust + PLANT_GAIN * deflection;
        yaw_rate.set(yaw_rate.get() + (target - yaw_rate.get()) * dt / PLANT_TAU);

        if step % 100 == 0 {
            println!(
                "{:5.2}, {:6.0}, {:6.1}, {:7.2}, {:6.1}",
                t,
                registry.read("CH1_USEC").unwrap_or_default(),
                gust,
                registry.read("IMU_RATE").unwrap_or_default(),
                registry.read("PID_USEC").unwrap_or_default(),
            );
        }
    }

    println!();
    registry.for_each(|name, value| println!("{:>12} = {:8.2}", name, value));
}
