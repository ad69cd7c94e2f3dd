//! Segmented motion profile generator.
//!
//! Sequences an ordered list of motion segments into a reference
//! trajectory. Each segment is a point-to-point move under velocity and
//! acceleration limits — trapezoidal when the move is long enough to
//! sustain the velocity limit, triangular otherwise — followed by a dwell
//! at the target.
//!
//! The reference is not evaluated in closed form: the generator integrates
//! velocity, then position, forward one sample period per tick, so phase,
//! elapsed time and position persist across ticks. On dwell entry the
//! reference snaps to the segment target, bounding accumulated integration
//! error at one sample period of velocity.

use sea_common::config::{ConfigError, SegmentConfig};

/// Validated ordered segment list.
#[derive(Debug, Clone)]
pub struct Profile {
    segments: Vec<SegmentConfig>,
}

impl Profile {
    /// Validate and take ownership of a segment list.
    ///
    /// Rejects an empty list and any segment with non-positive limits —
    /// configuration errors surface here, never at tick time.
    pub fn new(segments: Vec<SegmentConfig>) -> Result<Self, ConfigError> {
        if segments.is_empty() {
            return Err(ConfigError::Validation(
                "profile must contain at least one segment".into(),
            ));
        }
        for (i, seg) in segments.iter().enumerate() {
            seg.validate()
                .map_err(|e| ConfigError::Validation(format!("profile segment {i}: {e}")))?;
        }
        Ok(Self { segments })
    }

    /// The segment table.
    #[inline]
    pub fn segments(&self) -> &[SegmentConfig] {
        &self.segments
    }

    /// Number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false for a constructed profile.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

// ─── Ramp Law ───────────────────────────────────────────────────────

/// Ramp phase within the active segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Accelerate,
    Cruise,
    Decelerate,
    Dwell,
}

/// Precomputed ramp law for one segment, fixed at segment entry.
#[derive(Debug, Clone, Copy)]
struct SegmentPlan {
    /// Absolute target position [rev].
    target: f64,
    /// Travel direction: ±1, or 0 for a zero-distance segment.
    direction: f64,
    /// Peak velocity magnitude [rev/s].
    peak_velocity: f64,
    /// Acceleration magnitude [rev/s²].
    accel: f64,
    /// Acceleration (and, symmetrically, deceleration) duration [s].
    t_accel: f64,
    /// Constant-velocity duration [s]; 0 for triangular moves.
    t_cruise: f64,
    /// Dwell duration at target [s].
    dwell: f64,
}

impl SegmentPlan {
    /// Plan the move from `start` to the segment target.
    ///
    /// Feasibility threshold `Δthresh = v² / a` splits the two shapes:
    /// at or above it the limit velocity is sustained (trapezoid), below
    /// it the peak is `sqrt(a · |Δ|)` and deceleration begins immediately
    /// after the ramp-up (triangle).
    fn build(start: f64, seg: &SegmentConfig) -> Self {
        let delta = seg.target - start;
        let distance = delta.abs();
        let direction = if delta > 0.0 {
            1.0
        } else if delta < 0.0 {
            -1.0
        } else {
            0.0
        };

        let threshold = seg.velocity_limit * seg.velocity_limit / seg.accel_limit;
        let (peak_velocity, t_cruise) = if distance >= threshold {
            (
                seg.velocity_limit,
                (distance - threshold) / seg.velocity_limit,
            )
        } else {
            ((seg.accel_limit * distance).sqrt(), 0.0)
        };

        Self {
            target: seg.target,
            direction,
            peak_velocity,
            accel: seg.accel_limit,
            t_accel: peak_velocity / seg.accel_limit,
            t_cruise,
            dwell: seg.dwell,
        }
    }
}

// ─── Generator ──────────────────────────────────────────────────────

/// Stateful sequencer over a [`Profile`].
///
/// Created once per control session and advanced exactly once per tick by
/// the session worker; never shared.
#[derive(Debug)]
pub struct ProfileGenerator {
    profile: Profile,
    seg_index: usize,
    plan: SegmentPlan,
    phase: Phase,
    phase_elapsed: f64,
    velocity: f64,
    reference: f64,
    ticks: u64,
    completed_at: Option<u64>,
}

impl ProfileGenerator {
    /// Start the generator at position 0 on the profile's first segment.
    pub fn new(profile: Profile) -> Self {
        let plan = SegmentPlan::build(0.0, &profile.segments()[0]);
        let phase = if plan.direction == 0.0 {
            Phase::Dwell
        } else {
            Phase::Accelerate
        };
        Self {
            profile,
            seg_index: 0,
            plan,
            phase,
            phase_elapsed: 0.0,
            velocity: 0.0,
            reference: 0.0,
            ticks: 0,
            completed_at: None,
        }
    }

    /// Advance one sample period and return the reference value [rev].
    ///
    /// After the last segment's dwell completes the generator keeps
    /// returning the final target unchanged.
    pub fn advance(&mut self, dt: f64) -> f64 {
        self.ticks += 1;
        if self.completed_at.is_some() {
            return self.reference;
        }

        match self.phase {
            Phase::Accelerate => {
                self.velocity += self.plan.direction * self.plan.accel * dt;
                if self.velocity.abs() > self.plan.peak_velocity {
                    self.velocity = self.plan.direction * self.plan.peak_velocity;
                }
                self.reference += self.velocity * dt;
                self.phase_elapsed += dt;
                if self.phase_elapsed >= self.plan.t_accel {
                    self.velocity = self.plan.direction * self.plan.peak_velocity;
                    self.phase_elapsed = 0.0;
                    self.phase = if self.plan.t_cruise > 0.0 {
                        Phase::Cruise
                    } else {
                        Phase::Decelerate
                    };
                }
            }
            Phase::Cruise => {
                self.velocity = self.plan.direction * self.plan.peak_velocity;
                self.reference += self.velocity * dt;
                self.phase_elapsed += dt;
                if self.phase_elapsed >= self.plan.t_cruise {
                    self.phase_elapsed = 0.0;
                    self.phase = Phase::Decelerate;
                }
            }
            Phase::Decelerate => {
                self.velocity -= self.plan.direction * self.plan.accel * dt;
                // Never let the ramp-down reverse direction.
                if self.velocity * self.plan.direction < 0.0 {
                    self.velocity = 0.0;
                }
                self.reference += self.velocity * dt;
                self.phase_elapsed += dt;
                if self.phase_elapsed >= self.plan.t_accel {
                    self.enter_dwell();
                }
            }
            Phase::Dwell => {
                self.phase_elapsed += dt;
                if self.phase_elapsed >= self.plan.dwell {
                    self.next_segment();
                }
            }
        }

        self.reference
    }

    /// Total ticks emitted when the profile completed, if it has.
    #[inline]
    pub const fn completion(&self) -> Option<u64> {
        self.completed_at
    }

    /// Total ticks emitted since session start.
    #[inline]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current signed reference velocity [rev/s].
    #[inline]
    pub const fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Last emitted reference value [rev].
    #[inline]
    pub const fn reference(&self) -> f64 {
        self.reference
    }

    /// Index of the active segment.
    #[inline]
    pub const fn segment_index(&self) -> usize {
        self.seg_index
    }

    fn enter_dwell(&mut self) {
        self.velocity = 0.0;
        self.reference = self.plan.target;
        self.phase = Phase::Dwell;
        self.phase_elapsed = 0.0;
    }

    fn next_segment(&mut self) {
        self.seg_index += 1;
        if self.seg_index >= self.profile.len() {
            // Last dwell elapsed: freeze the emitted-tick count for export
            // and hold the final target from here on.
            self.completed_at = Some(self.ticks);
            return;
        }
        self.plan = SegmentPlan::build(self.reference, &self.profile.segments()[self.seg_index]);
        self.velocity = 0.0;
        self.phase_elapsed = 0.0;
        self.phase = if self.plan.direction == 0.0 {
            self.reference = self.plan.target;
            Phase::Dwell
        } else {
            Phase::Accelerate
        };
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
