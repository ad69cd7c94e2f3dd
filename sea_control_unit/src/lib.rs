//! # SEA Control Unit Library
//!
//! Fixed-rate digital motor controller for a series-elastic-actuator test
//! rig. A deterministic tick, paced by a hardware timer interrupt, compares
//! sensed position/torque against a segmented motion profile and filters
//! the error through cascaded biquad sections to produce the actuator
//! command.
//!
//! ## Structure
//!
//! - [`control`] — biquad filter cascades and the single/double loop
//!   control topology.
//! - [`profile`] — trapezoidal/triangular motion profile generator.
//! - [`session`] — the tick scheduler: `Idle → Running → Draining →
//!   Stopped`, bounded sample log, tick statistics.
//! - [`sim`] — simulation backends for the rig traits.
//! - [`recorder`] — JSON run exporter.
//! - [`rt`] — optional PREEMPT_RT worker setup.
//!
//! ## Execution model
//!
//! The whole control path runs on one dedicated worker. The only
//! cross-thread state is the supervisor's stop flag, sampled once per wake
//! by the tick source; a tick that has started always runs to completion.

pub mod control;
pub mod error;
pub mod profile;
pub mod recorder;
pub mod rt;
pub mod session;
pub mod sim;
