//! Hardware collaborator traits.
//!
//! The control unit never talks to hardware directly; it consumes these
//! two traits, enabling pluggable backends (simulation, FPGA I/O board).
//!
//! # Lifecycle
//!
//! 1. The session reads both encoder counters once to capture its baseline.
//! 2. Every tick: `wait_for_tick()` → `rearm()` → reads/write → `acknowledge()`.
//! 3. On shutdown the session writes 0 V — backends must accept that write
//!    in every state.
//!
//! Any `RigError` surfaced during a running session is fatal: the session
//! attempts a best-effort zero write and drains. No operation is retried.

use thiserror::Error;

/// Error types for rig I/O operations.
#[derive(Debug, Clone, Error)]
pub enum RigError {
    /// Encoder counter read failed.
    #[error("sensor read failed: {0}")]
    SensorRead(String),

    /// D/A converter write failed.
    #[error("actuator write failed: {0}")]
    ActuatorWrite(String),

    /// Timer wait/rearm/acknowledge failed.
    #[error("timer error: {0}")]
    Timer(String),
}

/// Encoder channel selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderChannel {
    /// Motor-shaft encoder.
    Motor,
    /// Load-shaft (output pulley) encoder.
    Load,
}

/// Result of one wait on the tick source.
#[derive(Debug, Clone, Copy)]
pub struct TickWake {
    /// The hardware timer asserted — run one control tick.
    pub asserted: bool,
    /// The supervisor's run flag, sampled once per wake. `false` means a
    /// stop was requested; no control computation may follow that wake.
    pub still_running: bool,
}

/// Sensor and actuator access.
///
/// `read_counter` returns the raw absolute counter value; the session
/// subtracts the baseline it captured at start, so backends carry no
/// per-session state for that.
pub trait RigIo {
    /// Read the raw encoder counter [ticks].
    fn read_counter(&mut self, channel: EncoderChannel) -> Result<i64, RigError>;

    /// Write the actuator command voltage [V].
    fn write_actuator(&mut self, volts: f64) -> Result<(), RigError>;
}

/// Fixed-period tick source standing in for the hardware timer interrupt.
pub trait TickTimer {
    /// Block until the timer asserts or a stop is requested.
    ///
    /// The two wake causes are distinguished by the returned [`TickWake`]:
    /// a stop-triggered wake carries `asserted == false`.
    fn wait_for_tick(&mut self) -> Result<TickWake, RigError>;

    /// Rearm the timer for the next period [µs]. Called first thing after
    /// an asserted wake, before the tick body runs.
    fn rearm(&mut self, period_us: u32) -> Result<(), RigError>;

    /// Acknowledge the interrupt assertion after the tick body completes.
    fn acknowledge(&mut self) -> Result<(), RigError>;
}
