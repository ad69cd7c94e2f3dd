//! Shared defaults and parameter bounds.
//!
//! The mechanical defaults are the measured constants of the bench SEA rig
//! (torque and amplifier constants, spring rate, encoder resolutions).

/// Default sample period [µs] (5000 µs ⇒ 200 Hz).
pub const SAMPLE_PERIOD_US_DEFAULT: u32 = 5_000;
/// Minimum accepted sample period [µs].
pub const SAMPLE_PERIOD_US_MIN: u32 = 100;
/// Maximum accepted sample period [µs] (1 s).
pub const SAMPLE_PERIOD_US_MAX: u32 = 1_000_000;

/// Default sample log capacity [ticks].
pub const LOG_CAPACITY_DEFAULT: usize = 5_000;

/// D/A converter output range [V].
pub const ACTUATOR_MIN_V_DEFAULT: f64 = -7.5;
pub const ACTUATOR_MAX_V_DEFAULT: f64 = 7.5;

/// Motor output torque range [N·m].
pub const TORQUE_MIN_NM_DEFAULT: f64 = -0.5;
pub const TORQUE_MAX_NM_DEFAULT: f64 = 0.5;

/// Motor torque constant Kt [N·m/A].
pub const TORQUE_CONSTANT_DEFAULT: f64 = 0.0214;
/// Amplifier transconductance Kvi [A/V].
pub const AMPLIFIER_GAIN_DEFAULT: f64 = 0.41;
/// Rotational spring constant Krot [N·m/rad].
pub const SPRING_CONSTANT_DEFAULT: f64 = 0.4624;
/// Motor-side encoder resolution [ticks/rev].
pub const TICKS_PER_REV_MOTOR_DEFAULT: f64 = 2_000.0;
/// Load-side encoder resolution [ticks/rev].
pub const TICKS_PER_REV_LOAD_DEFAULT: f64 = 8_000.0;
/// Gearbox ratio between motor and output shaft.
pub const GEAR_RATIO_DEFAULT: f64 = 16.0;
