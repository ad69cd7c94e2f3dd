//! Integration tests: full control sessions against the simulation
//! backends, exercising both topologies, stop semantics, log bounding,
//! and the hardware-failure safe-stop path.

use std::f64::consts::TAU;

use sea_common::config::{
    BiquadConfig, Mechanics, OutputLimits, RunConfig, SegmentConfig, SessionConfig, TopologyConfig,
};
use sea_common::recorder::MemoryRecorder;
use sea_common::rig::{EncoderChannel, RigError, RigIo, TickTimer, TickWake};
use sea_control_unit::error::SessionError;
use sea_control_unit::session::{RunState, Session};
use sea_control_unit::sim::{SimRig, SimTimer, StaticRig};

// ─── Helpers ────────────────────────────────────────────────────────

fn unity_section() -> BiquadConfig {
    BiquadConfig {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
    }
}

fn gain_section(gain: f64) -> BiquadConfig {
    BiquadConfig {
        b0: gain,
        ..unity_section()
    }
}

fn seg(target: f64, dwell: f64) -> SegmentConfig {
    SegmentConfig {
        target,
        velocity_limit: 10.0,
        accel_limit: 10.0,
        dwell,
    }
}

fn single_loop_config(profile: Vec<SegmentConfig>, log_capacity: usize) -> RunConfig {
    RunConfig {
        session: SessionConfig {
            sample_period_us: 5_000,
            log_capacity,
        },
        limits: OutputLimits::default(),
        mechanics: Mechanics::default(),
        topology: TopologyConfig::SingleLoop {
            controller: vec![unity_section()],
        },
        profile,
    }
}

fn budget_timer(ticks: u64) -> SimTimer {
    SimTimer::new(5_000).unpaced().with_budget(ticks)
}

// ─── Single Loop ────────────────────────────────────────────────────

#[test]
fn identity_controller_commands_scaled_reference() {
    // Frozen shaft (actual ≡ 0) + unity controller: the command series must
    // equal the reference series scaled to radians, clamped to ±7.5 V.
    // Target 2 rev makes the scaled reference (≈12.6 rad) exercise the clamp.
    let config = single_loop_config(vec![seg(2.0, 0.5)], 5_000);
    let mut session = Session::new(
        &config,
        StaticRig::default(),
        budget_timer(400),
        MemoryRecorder::default(),
    )
    .unwrap();

    let summary = session.run().unwrap();
    assert_eq!(summary.ticks, 400);
    assert_eq!(session.state(), RunState::Stopped);

    let samples = session.log().samples();
    let written = &session.rig().written;
    // Pre-run stop write, one command per tick, drain zero write.
    assert_eq!(written.len(), samples.len() + 2);
    assert_eq!(written[0], 0.0);
    assert_eq!(*written.last().unwrap(), 0.0);

    let mut clamped_ticks = 0;
    for (i, sample) in samples.iter().enumerate() {
        assert_eq!(sample.actual_position, 0.0);
        let expected = sample.reference_position.clamp(-7.5, 7.5);
        assert!(
            (written[i + 1] - expected).abs() < 1e-12,
            "tick {i}: command {} != scaled reference {expected}",
            written[i + 1]
        );
        if written[i + 1] == 7.5 {
            clamped_ticks += 1;
        }
        let expected_torque = written[i + 1] * 0.0214 * 0.41;
        assert!((sample.motor_torque - expected_torque).abs() < 1e-12);
    }
    assert!(clamped_ticks > 0, "clamp never engaged");
}

#[test]
fn profile_completion_freezes_export_count() {
    // Short profile, long run: the exported series stops at completion even
    // though the loop (and the log) keep going.
    let config = single_loop_config(vec![seg(0.25, 0.1)], 5_000);
    let mut session = Session::new(
        &config,
        StaticRig::default(),
        budget_timer(300),
        MemoryRecorder::default(),
    )
    .unwrap();

    let summary = session.run().unwrap();
    let done = summary.completion_ticks.expect("profile should complete");
    assert!(done < 300, "completion at {done}");
    assert_eq!(summary.exported_samples, done as usize);
    assert_eq!(session.log().len(), 300, "log keeps filling past completion");

    let record = session.recorder().last.as_ref().unwrap();
    assert_eq!(record.len(), done as usize);
    assert_eq!(record.reference_position.len(), done as usize);
    // The held final dwell value is the last exported reference.
    let final_ref = *record.reference_position.last().unwrap();
    assert!((final_ref - 0.25 * TAU).abs() < 1e-9);
}

#[test]
fn log_capacity_bounds_samples_and_export() {
    let config = single_loop_config(vec![seg(1.0, 60.0)], 10);
    let mut session = Session::new(
        &config,
        StaticRig::default(),
        budget_timer(50),
        MemoryRecorder::default(),
    )
    .unwrap();

    let summary = session.run().unwrap();
    assert_eq!(summary.ticks, 50);
    assert_eq!(session.log().len(), 10);
    assert_eq!(summary.exported_samples, 10);
    assert_eq!(session.recorder().last.as_ref().unwrap().len(), 10);
}

#[test]
fn baseline_zeroes_nonzero_encoder_counts() {
    // Counters frozen at arbitrary values: the session baseline must make
    // both logged positions read zero.
    let rig = StaticRig {
        motor_ticks: 1_234,
        load_ticks: -8_765,
        written: Vec::new(),
    };
    let config = single_loop_config(vec![seg(1.0, 1.0)], 5_000);
    let mut session =
        Session::new(&config, rig, budget_timer(100), MemoryRecorder::default()).unwrap();

    session.run().unwrap();
    for sample in session.log().samples() {
        assert_eq!(sample.actual_position, 0.0);
        assert_eq!(sample.motor_position, 0.0);
    }
}

#[test]
fn session_runs_only_once() {
    let config = single_loop_config(vec![seg(1.0, 1.0)], 100);
    let mut session = Session::new(
        &config,
        StaticRig::default(),
        budget_timer(5),
        MemoryRecorder::default(),
    )
    .unwrap();

    session.run().unwrap();
    let err = session.run().unwrap_err();
    assert!(matches!(err, SessionError::Config(_)), "{err}");
}

// ─── Double Loop ────────────────────────────────────────────────────

#[test]
fn double_loop_clamps_torque_reference_then_tracks_it() {
    // Frozen shaft: actual spring torque is 0, so with unity cascades the
    // command equals the (torque-clamped) outer output.
    let config = RunConfig {
        session: SessionConfig {
            sample_period_us: 5_000,
            log_capacity: 5_000,
        },
        limits: OutputLimits::default(),
        mechanics: Mechanics::default(),
        topology: TopologyConfig::DoubleLoop {
            outer: vec![unity_section()],
            inner: vec![unity_section()],
        },
        profile: vec![seg(2.0, 0.5)],
    };
    let mut session = Session::new(
        &config,
        StaticRig::default(),
        budget_timer(300),
        MemoryRecorder::default(),
    )
    .unwrap();

    session.run().unwrap();

    let mut saturated_ticks = 0;
    for (i, sample) in session.log().samples().iter().enumerate() {
        let spring = sample.spring.expect("double loop logs the torque pair");
        assert_eq!(spring.actual, 0.0);
        let expected_reference = sample.reference_position.clamp(-0.5, 0.5);
        assert!(
            (spring.reference - expected_reference).abs() < 1e-12,
            "tick {i}"
        );
        let volts = session.rig().written[i + 1];
        assert!((volts - spring.reference).abs() < 1e-12, "tick {i}");
        if spring.reference == 0.5 {
            saturated_ticks += 1;
        }
    }
    assert!(saturated_ticks > 0, "torque clamp never engaged");

    let record = session.recorder().last.as_ref().unwrap();
    let ts_ref = record.spring_torque_reference.as_ref().unwrap();
    let ts_act = record.spring_torque_actual.as_ref().unwrap();
    assert_eq!(ts_ref.len(), record.len());
    assert!(ts_act.iter().all(|t| *t == 0.0));
}

// ─── Stop Semantics ─────────────────────────────────────────────────

/// Timer replaying a fixed wake script, then reporting stop forever.
struct ScriptedTimer {
    wakes: Vec<TickWake>,
    next: usize,
}

impl ScriptedTimer {
    fn new(wakes: Vec<TickWake>) -> Self {
        Self { wakes, next: 0 }
    }
}

impl TickTimer for ScriptedTimer {
    fn wait_for_tick(&mut self) -> Result<TickWake, RigError> {
        let wake = self.wakes.get(self.next).copied().unwrap_or(TickWake {
            asserted: false,
            still_running: false,
        });
        self.next += 1;
        Ok(wake)
    }

    fn rearm(&mut self, _period_us: u32) -> Result<(), RigError> {
        Ok(())
    }

    fn acknowledge(&mut self) -> Result<(), RigError> {
        Ok(())
    }
}

#[test]
fn stop_wake_runs_no_control_computation() {
    let asserted = TickWake {
        asserted: true,
        still_running: true,
    };
    let spurious = TickWake {
        asserted: false,
        still_running: true,
    };
    let stop = TickWake {
        asserted: false,
        still_running: false,
    };
    let timer = ScriptedTimer::new(vec![asserted, spurious, asserted, stop]);

    let config = single_loop_config(vec![seg(1.0, 1.0)], 100);
    let mut session = Session::new(
        &config,
        StaticRig::default(),
        timer,
        MemoryRecorder::default(),
    )
    .unwrap();

    let summary = session.run().unwrap();
    // Two asserted wakes → two complete ticks; the spurious wake and the
    // stop wake contribute nothing.
    assert_eq!(summary.ticks, 2);
    assert_eq!(session.log().len(), 2);
    assert_eq!(session.state(), RunState::Stopped);
    // Pre-run zero, two commands, drain zero.
    assert_eq!(session.rig().written.len(), 4);
    assert_eq!(*session.rig().written.last().unwrap(), 0.0);
}

#[test]
fn supervisor_stop_is_observed_at_next_wait() {
    // Flip the stop flag from a supervising thread while the loop is paced;
    // the session must drain without an error and zero the actuator last.
    let timer = SimTimer::new(1_000);
    let stop = timer.stop_handle();
    let config = single_loop_config(vec![seg(1.0, 60.0)], 10_000);
    let mut session = Session::new(
        &config,
        StaticRig::default(),
        timer,
        MemoryRecorder::default(),
    )
    .unwrap();

    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(50));
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });
    let summary = session.run().unwrap();
    handle.join().unwrap();

    assert!(summary.ticks > 0, "loop should have run before the stop");
    assert_eq!(session.state(), RunState::Stopped);
    assert_eq!(*session.rig().written.last().unwrap(), 0.0);
    assert!(session.recorder().last.is_some());
}

// ─── Hardware Failure ───────────────────────────────────────────────

/// Rig whose encoder read starts failing after a set number of reads.
struct FailingRig {
    reads: u32,
    fail_after: u32,
    written: Vec<f64>,
}

impl RigIo for FailingRig {
    fn read_counter(&mut self, _channel: EncoderChannel) -> Result<i64, RigError> {
        self.reads += 1;
        if self.reads > self.fail_after {
            return Err(RigError::SensorRead("encoder unplugged".into()));
        }
        Ok(0)
    }

    fn write_actuator(&mut self, volts: f64) -> Result<(), RigError> {
        self.written.push(volts);
        Ok(())
    }
}

#[test]
fn sensor_failure_forces_safe_stop_and_surfaces() {
    let rig = FailingRig {
        reads: 0,
        fail_after: 8, // calibration takes 2 reads, each tick 2 more
        written: Vec::new(),
    };
    let config = single_loop_config(vec![seg(1.0, 1.0)], 100);
    let mut session =
        Session::new(&config, rig, budget_timer(100), MemoryRecorder::default()).unwrap();

    let err = session.run().unwrap_err();
    assert!(matches!(err, SessionError::Rig(RigError::SensorRead(_))));
    assert_eq!(session.state(), RunState::Stopped);
    // Three complete ticks, then the failing tick wrote nothing and the
    // abort path wrote the safe zero.
    assert_eq!(session.log().len(), 3);
    assert_eq!(*session.rig().written.last().unwrap(), 0.0);
    // The record was still handed over, best-effort.
    assert_eq!(session.recorder().last.as_ref().unwrap().len(), 3);
}

// ─── Closed Loop Against the Plant ──────────────────────────────────

#[test]
fn proportional_control_moves_the_plant_toward_the_target() {
    let config = RunConfig {
        session: SessionConfig {
            sample_period_us: 5_000,
            log_capacity: 10_000,
        },
        limits: OutputLimits::default(),
        mechanics: Mechanics::default(),
        topology: TopologyConfig::SingleLoop {
            controller: vec![gain_section(2.0)],
        },
        profile: vec![SegmentConfig {
            target: 0.5,
            velocity_limit: 1.0,
            accel_limit: 2.0,
            dwell: 10.0,
        }],
    };
    let rig = SimRig::new(&config.mechanics, config.session.sample_period_s());
    let mut session =
        Session::new(&config, rig, budget_timer(3_000), MemoryRecorder::default()).unwrap();

    session.run().unwrap();

    let target_rad = 0.5 * TAU;
    let max_actual = session
        .log()
        .samples()
        .iter()
        .map(|s| s.actual_position)
        .fold(f64::MIN, f64::max);
    assert!(
        max_actual > 0.4 * target_rad,
        "plant barely moved: max actual {max_actual:.3} rad vs target {target_rad:.3} rad"
    );
    // Every command respected the actuator range: the implied motor torque
    // never exceeds 7.5 V · Kt · Kvi.
    let torque_bound = 7.5 * 0.0214 * 0.41 + 1e-12;
    for sample in session.log().samples() {
        assert!(sample.motor_torque.abs() <= torque_bound);
    }
}
