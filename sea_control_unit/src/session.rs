//! Fixed-rate control session: wait → rearm → tick body → acknowledge.
//!
//! One session owns one control topology, one profile generator and one
//! bounded sample log, and drives them through the lifecycle
//! `Idle → Running → Draining → Stopped`:
//!
//! - `Idle → Running`: one explicit encoder calibration establishes the
//!   session baseline, then the loop is entered.
//! - `Running`: one tick per timer assertion. A stop request is observed
//!   only at the wait; a tick that has started always runs to completion
//!   so the actuator is never left mid-update.
//! - `Draining`: zero actuator write, then the sample log and static
//!   metadata are handed to the recorder.
//!
//! Hardware I/O failures are not retried: they force an immediate drain
//! with a best-effort zero write and surface to the caller.

use std::f64::consts::TAU;
use std::time::Instant;

use sea_common::config::{Mechanics, OutputLimits, RunConfig, SegmentConfig};
use sea_common::recorder::{CoefficientTable, Recorder, RunRecord};
use sea_common::rig::{EncoderChannel, RigError, RigIo, TickTimer};

use crate::control::topology::{ControlTopology, SpringTorque};
use crate::error::SessionError;
use crate::profile::{Profile, ProfileGenerator};

// ─── Tick Statistics ────────────────────────────────────────────────

/// O(1) per-tick timing statistics. Updated every tick, no allocation.
#[derive(Debug, Clone)]
pub struct TickStats {
    /// Total ticks executed.
    pub count: u64,
    /// Last tick body duration [ns].
    pub last_ns: i64,
    /// Minimum tick body duration [ns].
    pub min_ns: i64,
    /// Maximum tick body duration [ns].
    pub max_ns: i64,
    /// Running sum for average computation.
    pub sum_ns: i64,
}

impl TickStats {
    /// New zeroed stats.
    pub const fn new() -> Self {
        Self {
            count: 0,
            last_ns: 0,
            min_ns: i64::MAX,
            max_ns: 0,
            sum_ns: 0,
        }
    }

    /// Record one tick body duration.
    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.count += 1;
        self.last_ns = duration_ns;
        if duration_ns < self.min_ns {
            self.min_ns = duration_ns;
        }
        if duration_ns > self.max_ns {
            self.max_ns = duration_ns;
        }
        self.sum_ns += duration_ns;
    }

    /// Average tick duration [ns] (0 if no ticks).
    #[inline]
    pub fn avg_ns(&self) -> i64 {
        if self.count == 0 {
            0
        } else {
            self.sum_ns / self.count as i64
        }
    }
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Sample Log ─────────────────────────────────────────────────────

/// One per-tick record. Positions in radians, torques in N·m.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// Reference position of the output shaft [rad].
    pub reference_position: f64,
    /// Actual position of the output shaft [rad].
    pub actual_position: f64,
    /// Actual position of the motor shaft [rad].
    pub motor_position: f64,
    /// Motor torque implied by the command voltage [N·m].
    pub motor_torque: f64,
    /// Spring torque pair (double loop only).
    pub spring: Option<SpringTorque>,
}

/// Capacity-bounded sample log.
///
/// Storage is reserved up front so the running loop never allocates.
/// Appends beyond capacity are silent no-ops — memory stays bounded for a
/// finite-duration run and overflow is not an error.
#[derive(Debug)]
pub struct SampleLog {
    samples: Vec<Sample>,
    capacity: usize,
}

impl SampleLog {
    /// Create a log with a fixed capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample if capacity remains; otherwise drop it.
    #[inline]
    pub fn append(&mut self, sample: Sample) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        }
    }

    /// Samples recorded so far.
    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples recorded.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the log holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Configured capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

// ─── Session ────────────────────────────────────────────────────────

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Configured, not yet started.
    Idle,
    /// Executing the tick loop.
    Running,
    /// Stop observed or fault hit: safing the actuator, exporting.
    Draining,
    /// Terminal.
    Stopped,
}

/// Encoder baseline captured once at `Idle → Running`.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    motor: i64,
    load: i64,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Total ticks executed.
    pub ticks: u64,
    /// Samples handed to the recorder.
    pub exported_samples: usize,
    /// Tick count at profile completion, if the profile finished.
    pub completion_ticks: Option<u64>,
    /// Tick body timing statistics.
    pub stats: TickStats,
}

/// The control session worker.
///
/// Owns every piece of mutable control state exclusively; the only
/// cross-thread input is the stop flag folded into the timer's wake.
pub struct Session<R: RigIo, T: TickTimer, W: Recorder> {
    rig: R,
    timer: T,
    recorder: W,
    topology: ControlTopology,
    generator: ProfileGenerator,
    log: SampleLog,
    limits: OutputLimits,
    mech: Mechanics,
    segments: Vec<SegmentConfig>,
    controllers: Vec<CoefficientTable>,
    period_us: u32,
    period_s: f64,
    state: RunState,
    baseline: Option<Baseline>,
    stats: TickStats,
    /// Tick count frozen at profile completion; caps the export length.
    frozen_count: Option<u64>,
}

impl<R: RigIo, T: TickTimer, W: Recorder> Session<R, T, W> {
    /// Build a session from a validated configuration and its collaborators.
    ///
    /// All configuration errors surface here, before any hardware motion.
    pub fn new(config: &RunConfig, rig: R, timer: T, recorder: W) -> Result<Self, SessionError> {
        config
            .validate()
            .map_err(sea_common::config::ConfigError::Validation)?;

        let topology = ControlTopology::from_config(&config.topology)?;
        let generator = ProfileGenerator::new(Profile::new(config.profile.clone())?);
        let controllers = config
            .topology
            .cascades()
            .into_iter()
            .map(|(name, sections)| CoefficientTable {
                name: name.to_string(),
                sections: sections.to_vec(),
            })
            .collect();

        Ok(Self {
            rig,
            timer,
            recorder,
            topology,
            generator,
            log: SampleLog::new(config.session.log_capacity),
            limits: config.limits,
            mech: config.mechanics,
            segments: config.profile.clone(),
            controllers,
            period_us: config.session.sample_period_us,
            period_s: config.session.sample_period_s(),
            state: RunState::Idle,
            baseline: None,
            stats: TickStats::new(),
            frozen_count: None,
        })
    }

    /// Current lifecycle state.
    #[inline]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// The bounded sample log.
    #[inline]
    pub fn log(&self) -> &SampleLog {
        &self.log
    }

    /// Tick statistics.
    #[inline]
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// The rig backend (for inspection after a run).
    #[inline]
    pub fn rig(&self) -> &R {
        &self.rig
    }

    /// The recorder sink (for inspection after a run).
    #[inline]
    pub fn recorder(&self) -> &W {
        &self.recorder
    }

    /// Run the session to a stop request (or a fatal rig error).
    ///
    /// Blocks the calling worker until the loop exits. Returns the run
    /// summary after the drain completed, or the error that aborted the
    /// session after a best-effort safe stop.
    pub fn run(&mut self) -> Result<RunSummary, SessionError> {
        if self.state != RunState::Idle {
            return Err(SessionError::Config(
                sea_common::config::ConfigError::Validation(
                    "session already consumed; create a new one per run".into(),
                ),
            ));
        }

        // Stop the motor before anything moves, then capture the baseline.
        if let Err(e) = self.rig.write_actuator(0.0) {
            return self.abort(e);
        }
        if let Err(e) = self.calibrate() {
            return self.abort(e);
        }
        self.state = RunState::Running;

        loop {
            let wake = match self.timer.wait_for_tick() {
                Ok(w) => w,
                Err(e) => return self.abort(e),
            };
            // Stop is checked once per iteration, right after waking. A
            // stop-triggered wake never runs a control computation.
            if !wake.still_running {
                break;
            }
            if !wake.asserted {
                continue;
            }
            if let Err(e) = self.timer.rearm(self.period_us) {
                return self.abort(e);
            }

            let started = Instant::now();
            if let Err(e) = self.tick() {
                return self.abort(e);
            }
            self.stats.record(started.elapsed().as_nanos() as i64);

            if let Err(e) = self.timer.acknowledge() {
                return self.abort(e);
            }
        }

        self.drain()
    }

    /// Capture the encoder baseline. Happens exactly once per session.
    fn calibrate(&mut self) -> Result<(), RigError> {
        let motor = self.rig.read_counter(EncoderChannel::Motor)?;
        let load = self.rig.read_counter(EncoderChannel::Load)?;
        self.baseline = Some(Baseline { motor, load });
        Ok(())
    }

    /// Baseline-relative shaft position [rev].
    fn position_revs(&mut self, channel: EncoderChannel) -> Result<f64, RigError> {
        let raw = self.rig.read_counter(channel)?;
        let (base, ticks_per_rev) = match (channel, &self.baseline) {
            (EncoderChannel::Motor, Some(b)) => (b.motor, self.mech.ticks_per_rev_motor),
            (EncoderChannel::Load, Some(b)) => (b.load, self.mech.ticks_per_rev_load),
            // Uncalibrated read: treat the first value as its own baseline.
            (EncoderChannel::Motor, None) => (raw, self.mech.ticks_per_rev_motor),
            (EncoderChannel::Load, None) => (raw, self.mech.ticks_per_rev_load),
        };
        Ok((raw - base) as f64 / ticks_per_rev)
    }

    /// One control tick: profile advance, sense, filter, clamp, actuate, log.
    fn tick(&mut self) -> Result<(), RigError> {
        let reference_rev = self.generator.advance(self.period_s);
        if self.frozen_count.is_none() {
            self.frozen_count = self.generator.completion();
        }

        let actual_rev = self.position_revs(EncoderChannel::Load)?;
        let motor_rev = self.position_revs(EncoderChannel::Motor)?;

        // Error in radians; spring deflection estimates the actual torque.
        let position_error = (reference_rev - actual_rev) * TAU;
        let spring_torque = (actual_rev - motor_rev) * TAU * self.mech.spring_constant;

        let command = self
            .topology
            .step(position_error, spring_torque, &self.limits);

        self.rig.write_actuator(command.volts)?;

        self.log.append(Sample {
            reference_position: reference_rev * TAU,
            actual_position: actual_rev * TAU,
            motor_position: motor_rev * TAU,
            motor_torque: command.volts * self.mech.torque_constant * self.mech.amplifier_gain,
            spring: command.spring,
        });

        Ok(())
    }

    /// Samples the export will carry: profile completion freezes the count.
    fn exported_len(&self) -> usize {
        match self.frozen_count {
            Some(n) => (n as usize).min(self.log.len()),
            None => self.log.len(),
        }
    }

    /// Assemble the run record from the log and the static metadata.
    fn run_record(&self) -> RunRecord {
        let n = self.exported_len();
        let samples = &self.log.samples()[..n];
        let double = self.topology.is_double_loop();

        RunRecord {
            sample_period_s: self.period_s,
            time: (0..n).map(|j| j as f64 * self.period_s).collect(),
            segments: self.segments.clone(),
            reference_position: samples.iter().map(|s| s.reference_position).collect(),
            actual_position: samples.iter().map(|s| s.actual_position).collect(),
            motor_position: samples.iter().map(|s| s.motor_position).collect(),
            motor_torque: samples.iter().map(|s| s.motor_torque).collect(),
            spring_torque_reference: double.then(|| {
                samples
                    .iter()
                    .map(|s| s.spring.map_or(0.0, |sp| sp.reference))
                    .collect()
            }),
            spring_torque_actual: double.then(|| {
                samples
                    .iter()
                    .map(|s| s.spring.map_or(0.0, |sp| sp.actual))
                    .collect()
            }),
            controllers: self.controllers.clone(),
        }
    }

    /// Orderly shutdown: safe the actuator, hand the record over.
    fn drain(&mut self) -> Result<RunSummary, SessionError> {
        self.state = RunState::Draining;
        self.rig.write_actuator(0.0)?;
        let record = self.run_record();
        self.recorder.record(&record)?;
        self.state = RunState::Stopped;
        Ok(self.summary())
    }

    /// Fatal-path shutdown: everything best-effort, original error wins.
    fn abort(&mut self, error: RigError) -> Result<RunSummary, SessionError> {
        self.state = RunState::Draining;
        let _ = self.rig.write_actuator(0.0);
        let record = self.run_record();
        let _ = self.recorder.record(&record);
        self.state = RunState::Stopped;
        Err(SessionError::Rig(error))
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.generator.ticks(),
            exported_samples: self.exported_len(),
            completion_ticks: self.frozen_count,
            stats: self.stats.clone(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
