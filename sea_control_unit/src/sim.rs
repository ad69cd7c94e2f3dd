//! Simulation backends for the rig traits.
//!
//! [`SimTimer`] stands in for the hardware timer interrupt and carries the
//! supervisor's stop flag; [`SimRig`] is a two-inertia spring-coupled
//! plant for closed-loop runs; [`StaticRig`] is a frozen-shaft double for
//! open-loop and property tests.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use sea_common::config::Mechanics;
use sea_common::rig::{EncoderChannel, RigError, RigIo, TickTimer, TickWake};

// ─── Tick Source ────────────────────────────────────────────────────

/// Software tick source.
///
/// Paced mode sleeps one sample period per wait; unpaced mode returns
/// immediately, which lets tests run sessions at full speed. An optional
/// tick budget clears the run flag after N assertions, and the shared
/// [`stop_handle`](SimTimer::stop_handle) lets a supervising thread
/// request shutdown at any time.
pub struct SimTimer {
    period_us: u32,
    paced: bool,
    running: Arc<AtomicBool>,
    budget: Option<u64>,
}

impl SimTimer {
    /// Paced timer with the given period [µs].
    pub fn new(period_us: u32) -> Self {
        Self {
            period_us,
            paced: true,
            running: Arc::new(AtomicBool::new(true)),
            budget: None,
        }
    }

    /// Return immediately from every wait instead of sleeping.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Clear the run flag after `max_ticks` assertions.
    pub fn with_budget(mut self, max_ticks: u64) -> Self {
        self.budget = Some(max_ticks);
        self
    }

    /// Shared run flag; store `false` to request shutdown.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

impl TickTimer for SimTimer {
    fn wait_for_tick(&mut self) -> Result<TickWake, RigError> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(TickWake {
                asserted: false,
                still_running: false,
            });
        }

        if let Some(remaining) = self.budget {
            if remaining == 0 {
                self.running.store(false, Ordering::SeqCst);
                return Ok(TickWake {
                    asserted: false,
                    still_running: false,
                });
            }
            self.budget = Some(remaining - 1);
        }

        if self.paced {
            thread::sleep(Duration::from_micros(self.period_us as u64));
        }

        // The stop flag may have flipped during the sleep; a stop-triggered
        // wake must not assert a control tick.
        let still_running = self.running.load(Ordering::SeqCst);
        Ok(TickWake {
            asserted: still_running,
            still_running,
        })
    }

    fn rearm(&mut self, period_us: u32) -> Result<(), RigError> {
        self.period_us = period_us;
        Ok(())
    }

    fn acknowledge(&mut self) -> Result<(), RigError> {
        Ok(())
    }
}

// ─── Two-Inertia Plant ──────────────────────────────────────────────

/// Two-inertia series-elastic plant.
///
/// The amplifier turns the command voltage into motor torque
/// (`V · Kvi · Kt`); a torsion spring couples the geared-down motor shaft
/// to the load shaft. Physics advance one sample period per actuator
/// write (zero-order hold), so reads within a tick see a consistent state.
pub struct SimRig {
    mech: Mechanics,
    dt: f64,
    motor_inertia: f64,
    load_inertia: f64,
    damping: f64,
    /// Motor shaft angle [rad] and velocity [rad/s].
    motor_angle: f64,
    motor_velocity: f64,
    /// Load shaft angle [rad] and velocity [rad/s].
    load_angle: f64,
    load_velocity: f64,
}

impl SimRig {
    /// Plant with bench-plausible inertias, stepped at `period_s`.
    pub fn new(mech: &Mechanics, period_s: f64) -> Self {
        Self {
            mech: *mech,
            dt: period_s,
            motor_inertia: 2e-5,
            load_inertia: 1e-3,
            damping: 5e-4,
            motor_angle: 0.0,
            motor_velocity: 0.0,
            load_angle: 0.0,
            load_velocity: 0.0,
        }
    }

    /// Load shaft angle [rad], for assertions.
    pub fn load_angle(&self) -> f64 {
        self.load_angle
    }

    fn step(&mut self, volts: f64) {
        let m = &self.mech;
        let motor_torque = volts * m.amplifier_gain * m.torque_constant;
        let deflection = self.motor_angle / m.gear_ratio - self.load_angle;
        let spring_torque = m.spring_constant * deflection;

        let motor_accel = (motor_torque
            - spring_torque / m.gear_ratio
            - self.damping * self.motor_velocity)
            / self.motor_inertia;
        let load_accel = (spring_torque - self.damping * self.load_velocity) / self.load_inertia;

        self.motor_velocity += motor_accel * self.dt;
        self.motor_angle += self.motor_velocity * self.dt;
        self.load_velocity += load_accel * self.dt;
        self.load_angle += self.load_velocity * self.dt;
    }
}

impl RigIo for SimRig {
    fn read_counter(&mut self, channel: EncoderChannel) -> Result<i64, RigError> {
        let ticks = match channel {
            EncoderChannel::Motor => self.motor_angle / TAU * self.mech.ticks_per_rev_motor,
            EncoderChannel::Load => self.load_angle / TAU * self.mech.ticks_per_rev_load,
        };
        Ok(ticks.round() as i64)
    }

    fn write_actuator(&mut self, volts: f64) -> Result<(), RigError> {
        if !volts.is_finite() {
            return Err(RigError::ActuatorWrite(format!(
                "non-finite command: {volts}"
            )));
        }
        self.step(volts);
        Ok(())
    }
}

// ─── Frozen-Shaft Double ────────────────────────────────────────────

/// Rig whose shafts never move: every read returns the configured counter
/// values, every written command is retained for inspection.
#[derive(Debug, Default)]
pub struct StaticRig {
    /// Constant motor counter value [ticks].
    pub motor_ticks: i64,
    /// Constant load counter value [ticks].
    pub load_ticks: i64,
    /// Every voltage written, in order.
    pub written: Vec<f64>,
}

impl RigIo for StaticRig {
    fn read_counter(&mut self, channel: EncoderChannel) -> Result<i64, RigError> {
        Ok(match channel {
            EncoderChannel::Motor => self.motor_ticks,
            EncoderChannel::Load => self.load_ticks,
        })
    }

    fn write_actuator(&mut self, volts: f64) -> Result<(), RigError> {
        self.written.push(volts);
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_timer_stops_after_n_ticks() {
        let mut timer = SimTimer::new(5_000).unpaced().with_budget(3);
        let mut asserted = 0;
        loop {
            let wake = timer.wait_for_tick().unwrap();
            if !wake.still_running {
                break;
            }
            assert!(wake.asserted);
            asserted += 1;
            assert!(asserted <= 3, "budget exceeded");
        }
        assert_eq!(asserted, 3);
    }

    #[test]
    fn stop_handle_requests_shutdown() {
        let mut timer = SimTimer::new(5_000).unpaced();
        let stop = timer.stop_handle();
        assert!(timer.wait_for_tick().unwrap().still_running);
        stop.store(false, Ordering::SeqCst);
        let wake = timer.wait_for_tick().unwrap();
        assert!(!wake.still_running);
        assert!(!wake.asserted, "stop-triggered wake must not assert");
    }

    #[test]
    fn sim_rig_moves_under_positive_voltage() {
        let mech = Mechanics::default();
        let mut rig = SimRig::new(&mech, 0.005);
        for _ in 0..400 {
            rig.write_actuator(5.0).unwrap();
        }
        assert!(
            rig.load_angle() > 0.0,
            "load shaft should follow the motor: {}",
            rig.load_angle()
        );
        let ticks = rig.read_counter(EncoderChannel::Load).unwrap();
        assert!(ticks > 0);
    }

    #[test]
    fn sim_rig_rejects_non_finite_command() {
        let mech = Mechanics::default();
        let mut rig = SimRig::new(&mech, 0.005);
        assert!(rig.write_actuator(f64::NAN).is_err());
    }

    #[test]
    fn static_rig_never_moves() {
        let mut rig = StaticRig::default();
        rig.write_actuator(3.0).unwrap();
        rig.write_actuator(-3.0).unwrap();
        assert_eq!(rig.read_counter(EncoderChannel::Load).unwrap(), 0);
        assert_eq!(rig.written, vec![3.0, -3.0]);
    }
}
