//! TOML configuration for a control session.
//!
//! All config types use `serde::Deserialize` for TOML loading; optional
//! fields fall back to the rig defaults in [`crate::consts`]. Every
//! structure has a `validate()` that rejects a bad configuration before
//! the session is allowed to start — a session is never entered with
//! unchecked parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    ACTUATOR_MAX_V_DEFAULT, ACTUATOR_MIN_V_DEFAULT, AMPLIFIER_GAIN_DEFAULT, GEAR_RATIO_DEFAULT,
    LOG_CAPACITY_DEFAULT, SAMPLE_PERIOD_US_DEFAULT, SAMPLE_PERIOD_US_MAX, SAMPLE_PERIOD_US_MIN,
    SPRING_CONSTANT_DEFAULT, TICKS_PER_REV_LOAD_DEFAULT, TICKS_PER_REV_MOTOR_DEFAULT,
    TORQUE_CONSTANT_DEFAULT, TORQUE_MAX_NM_DEFAULT, TORQUE_MIN_NM_DEFAULT,
};

// ─── Error Type ─────────────────────────────────────────────────────

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("config I/O error: {0}")]
    Io(String),
    /// TOML parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Parameter validation error.
    #[error("config validation: {0}")]
    Validation(String),
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete configuration for one control session.
///
/// Immutable once the session leaves `Idle`; there is no hot reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Loop timing and log sizing.
    #[serde(default)]
    pub session: SessionConfig,
    /// Actuator and torque saturation ranges.
    #[serde(default)]
    pub limits: OutputLimits,
    /// Mechanical constants of the rig.
    #[serde(default)]
    pub mechanics: Mechanics,
    /// Control topology and cascade coefficient tables.
    pub topology: TopologyConfig,
    /// Ordered motion segments.
    pub profile: Vec<SegmentConfig>,
}

impl RunConfig {
    /// Validate the whole bundle. Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        self.session.validate()?;
        self.limits.validate()?;
        self.mechanics.validate()?;
        self.topology.validate()?;

        if self.profile.is_empty() {
            return Err("profile must contain at least one segment".into());
        }
        for (i, seg) in self.profile.iter().enumerate() {
            seg.validate()
                .map_err(|e| format!("profile segment {i}: {e}"))?;
        }
        Ok(())
    }

    /// Parse a config from a TOML string and validate it.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate().map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Load and validate a session configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
    RunConfig::from_toml(&text)
}

// ─── Session Timing ─────────────────────────────────────────────────

/// Loop timing and sample log sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sample period [µs] (default: 5000 = 200 Hz).
    #[serde(default = "default_sample_period_us")]
    pub sample_period_us: u32,
    /// Sample log capacity [ticks]; appends beyond this are dropped.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_sample_period_us() -> u32 {
    SAMPLE_PERIOD_US_DEFAULT
}
fn default_log_capacity() -> usize {
    LOG_CAPACITY_DEFAULT
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_period_us: SAMPLE_PERIOD_US_DEFAULT,
            log_capacity: LOG_CAPACITY_DEFAULT,
        }
    }
}

impl SessionConfig {
    /// Validate timing bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_period_us < SAMPLE_PERIOD_US_MIN
            || self.sample_period_us > SAMPLE_PERIOD_US_MAX
        {
            return Err(format!(
                "sample_period_us {} out of range [{}, {}]",
                self.sample_period_us, SAMPLE_PERIOD_US_MIN, SAMPLE_PERIOD_US_MAX
            ));
        }
        if self.log_capacity == 0 {
            return Err("log_capacity must be at least 1".into());
        }
        Ok(())
    }

    /// Sample period [s].
    #[inline]
    pub fn sample_period_s(&self) -> f64 {
        self.sample_period_us as f64 / 1e6
    }
}

// ─── Saturation Limits ──────────────────────────────────────────────

/// Output saturation ranges for the control cascades.
///
/// The actuator range bounds the voltage written to the D/A converter;
/// the torque range bounds the outer loop's spring torque reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputLimits {
    /// Minimum D/A output [V].
    #[serde(default = "default_actuator_min_v")]
    pub actuator_min_v: f64,
    /// Maximum D/A output [V].
    #[serde(default = "default_actuator_max_v")]
    pub actuator_max_v: f64,
    /// Minimum spring torque reference [N·m].
    #[serde(default = "default_torque_min_nm")]
    pub torque_min_nm: f64,
    /// Maximum spring torque reference [N·m].
    #[serde(default = "default_torque_max_nm")]
    pub torque_max_nm: f64,
}

fn default_actuator_min_v() -> f64 {
    ACTUATOR_MIN_V_DEFAULT
}
fn default_actuator_max_v() -> f64 {
    ACTUATOR_MAX_V_DEFAULT
}
fn default_torque_min_nm() -> f64 {
    TORQUE_MIN_NM_DEFAULT
}
fn default_torque_max_nm() -> f64 {
    TORQUE_MAX_NM_DEFAULT
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            actuator_min_v: ACTUATOR_MIN_V_DEFAULT,
            actuator_max_v: ACTUATOR_MAX_V_DEFAULT,
            torque_min_nm: TORQUE_MIN_NM_DEFAULT,
            torque_max_nm: TORQUE_MAX_NM_DEFAULT,
        }
    }
}

impl OutputLimits {
    /// Validate that each range is well-ordered and finite.
    pub fn validate(&self) -> Result<(), String> {
        let pairs = [
            ("actuator", self.actuator_min_v, self.actuator_max_v),
            ("torque", self.torque_min_nm, self.torque_max_nm),
        ];
        for (name, lo, hi) in pairs {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(format!("{name} limits must be finite"));
            }
            if lo > hi {
                return Err(format!("{name} limits inverted: {lo} > {hi}"));
            }
        }
        Ok(())
    }
}

// ─── Mechanical Constants ───────────────────────────────────────────

/// Mechanical constants of the rig, all strictly positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Mechanics {
    /// Motor torque constant Kt [N·m/A].
    #[serde(default = "default_torque_constant")]
    pub torque_constant: f64,
    /// Amplifier transconductance Kvi [A/V].
    #[serde(default = "default_amplifier_gain")]
    pub amplifier_gain: f64,
    /// Rotational spring constant Krot [N·m/rad].
    #[serde(default = "default_spring_constant")]
    pub spring_constant: f64,
    /// Motor-side encoder resolution [ticks/rev].
    #[serde(default = "default_ticks_per_rev_motor")]
    pub ticks_per_rev_motor: f64,
    /// Load-side encoder resolution [ticks/rev].
    #[serde(default = "default_ticks_per_rev_load")]
    pub ticks_per_rev_load: f64,
    /// Gearbox ratio between motor and output shaft.
    #[serde(default = "default_gear_ratio")]
    pub gear_ratio: f64,
}

fn default_torque_constant() -> f64 {
    TORQUE_CONSTANT_DEFAULT
}
fn default_amplifier_gain() -> f64 {
    AMPLIFIER_GAIN_DEFAULT
}
fn default_spring_constant() -> f64 {
    SPRING_CONSTANT_DEFAULT
}
fn default_ticks_per_rev_motor() -> f64 {
    TICKS_PER_REV_MOTOR_DEFAULT
}
fn default_ticks_per_rev_load() -> f64 {
    TICKS_PER_REV_LOAD_DEFAULT
}
fn default_gear_ratio() -> f64 {
    GEAR_RATIO_DEFAULT
}

impl Default for Mechanics {
    fn default() -> Self {
        Self {
            torque_constant: TORQUE_CONSTANT_DEFAULT,
            amplifier_gain: AMPLIFIER_GAIN_DEFAULT,
            spring_constant: SPRING_CONSTANT_DEFAULT,
            ticks_per_rev_motor: TICKS_PER_REV_MOTOR_DEFAULT,
            ticks_per_rev_load: TICKS_PER_REV_LOAD_DEFAULT,
            gear_ratio: GEAR_RATIO_DEFAULT,
        }
    }
}

impl Mechanics {
    /// Validate that every constant is finite and strictly positive.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("torque_constant", self.torque_constant),
            ("amplifier_gain", self.amplifier_gain),
            ("spring_constant", self.spring_constant),
            ("ticks_per_rev_motor", self.ticks_per_rev_motor),
            ("ticks_per_rev_load", self.ticks_per_rev_load),
            ("gear_ratio", self.gear_ratio),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{name} must be strictly positive, got {value}"));
            }
        }
        Ok(())
    }
}

// ─── Topology ───────────────────────────────────────────────────────

/// Control topology selection with the coefficient tables for each
/// cascade in use. Chosen once at configuration time, fixed for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TopologyConfig {
    /// Position error drives the actuator directly.
    SingleLoop {
        /// Position controller sections.
        controller: Vec<BiquadConfig>,
    },
    /// Outer position loop produces a spring torque reference tracked by
    /// an inner torque loop.
    DoubleLoop {
        /// Outer (position) controller sections.
        outer: Vec<BiquadConfig>,
        /// Inner (torque) controller sections.
        inner: Vec<BiquadConfig>,
    },
}

impl TopologyConfig {
    /// Validate every cascade: non-empty, each section well-formed.
    pub fn validate(&self) -> Result<(), String> {
        for (name, sections) in self.cascades() {
            if sections.is_empty() {
                return Err(format!("{name} cascade has no sections"));
            }
            for (i, s) in sections.iter().enumerate() {
                s.validate().map_err(|e| format!("{name} section {i}: {e}"))?;
            }
        }
        Ok(())
    }

    /// Named coefficient tables, in evaluation order.
    pub fn cascades(&self) -> Vec<(&'static str, &[BiquadConfig])> {
        match self {
            Self::SingleLoop { controller } => vec![("controller", controller.as_slice())],
            Self::DoubleLoop { outer, inner } => {
                vec![("outer", outer.as_slice()), ("inner", inner.as_slice())]
            }
        }
    }
}

/// One second-order section's coefficient set.
///
/// Transfer function (z-domain):
/// ```text
/// H(z) = (b0 + b1·z⁻¹ + b2·z⁻²) / (a0 + a1·z⁻¹ + a2·z⁻²)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BiquadConfig {
    pub b0: f64,
    #[serde(default)]
    pub b1: f64,
    #[serde(default)]
    pub b2: f64,
    /// Denominator normalizing factor; must be non-zero.
    #[serde(default = "default_a0")]
    pub a0: f64,
    #[serde(default)]
    pub a1: f64,
    #[serde(default)]
    pub a2: f64,
}

fn default_a0() -> f64 {
    1.0
}

impl BiquadConfig {
    /// Validate finiteness and the non-zero denominator normalizer.
    pub fn validate(&self) -> Result<(), String> {
        let coeffs = [self.b0, self.b1, self.b2, self.a0, self.a1, self.a2];
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err("coefficients must be finite".into());
        }
        if self.a0.abs() < 1e-15 {
            return Err(format!("a0 must be non-zero, got {}", self.a0));
        }
        Ok(())
    }
}

// ─── Motion Segments ────────────────────────────────────────────────

/// One motion segment: go to `target` under velocity/acceleration limits,
/// then hold for `dwell` seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Absolute target position [rev].
    pub target: f64,
    /// Velocity limit [rev/s], strictly positive.
    pub velocity_limit: f64,
    /// Acceleration limit [rev/s²], strictly positive.
    pub accel_limit: f64,
    /// Dwell duration at target [s], non-negative (default: 0).
    #[serde(default)]
    pub dwell: f64,
}

impl SegmentConfig {
    /// Reject unreachable segments before the loop ever starts.
    pub fn validate(&self) -> Result<(), String> {
        if !self.target.is_finite() {
            return Err("target must be finite".into());
        }
        if !self.velocity_limit.is_finite() || self.velocity_limit <= 0.0 {
            return Err(format!(
                "velocity_limit must be strictly positive, got {}",
                self.velocity_limit
            ));
        }
        if !self.accel_limit.is_finite() || self.accel_limit <= 0.0 {
            return Err(format!(
                "accel_limit must be strictly positive, got {}",
                self.accel_limit
            ));
        }
        if !self.dwell.is_finite() || self.dwell < 0.0 {
            return Err(format!("dwell must be non-negative, got {}", self.dwell));
        }
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
