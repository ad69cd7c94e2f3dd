//! Post-run record contract.
//!
//! After a session drains, the bounded sample log and the run's static
//! metadata are handed to a [`Recorder`] as one [`RunRecord`]. The on-disk
//! encoding is the recorder's concern, not the control unit's; the record
//! only fixes the logical quantities.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BiquadConfig, SegmentConfig};

/// Error during record persistence.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// The record could not be written.
    #[error("record write failed: {0}")]
    Write(String),
}

/// Named coefficient table for one cascade in use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoefficientTable {
    /// Cascade name ("controller", or "outer"/"inner").
    pub name: String,
    /// Section coefficients in evaluation order.
    pub sections: Vec<BiquadConfig>,
}

/// Everything a finished run exports.
///
/// All position series are in radians, torque series in N·m. Every series
/// has the same length as `time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Sample period [s].
    pub sample_period_s: f64,
    /// Elapsed time vector [s], `t[j] = j · sample_period_s`.
    pub time: Vec<f64>,
    /// The motion segment table the run executed.
    pub segments: Vec<SegmentConfig>,
    /// Reference position of the output shaft [rad].
    pub reference_position: Vec<f64>,
    /// Actual position of the output shaft [rad].
    pub actual_position: Vec<f64>,
    /// Actual position of the motor shaft [rad].
    pub motor_position: Vec<f64>,
    /// Motor torque, `V · Kt · Kvi` [N·m].
    pub motor_torque: Vec<f64>,
    /// Spring torque reference [N·m] (double loop only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spring_torque_reference: Option<Vec<f64>>,
    /// Estimated actual spring torque [N·m] (double loop only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spring_torque_actual: Option<Vec<f64>>,
    /// Coefficient tables of every cascade in use.
    pub controllers: Vec<CoefficientTable>,
}

impl RunRecord {
    /// Number of exported samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether the run exported no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Sink for a finished run's record.
pub trait Recorder {
    /// Persist the record. Called exactly once, during drain.
    fn record(&mut self, run: &RunRecord) -> Result<(), RecorderError>;
}

/// In-memory recorder retaining the last record, for tests and headless use.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    /// The most recently recorded run, if any.
    pub last: Option<RunRecord>,
}

impl Recorder for MemoryRecorder {
    fn record(&mut self, run: &RunRecord) -> Result<(), RecorderError> {
        self.last = Some(run.clone());
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_record() -> RunRecord {
        RunRecord {
            sample_period_s: 0.005,
            time: vec![],
            segments: vec![],
            reference_position: vec![],
            actual_position: vec![],
            motor_position: vec![],
            motor_torque: vec![],
            spring_torque_reference: None,
            spring_torque_actual: None,
            controllers: vec![],
        }
    }

    #[test]
    fn memory_recorder_retains_last() {
        let mut rec = MemoryRecorder::default();
        assert!(rec.last.is_none());
        rec.record(&empty_record()).unwrap();
        assert!(rec.last.is_some());
        assert!(rec.last.as_ref().unwrap().is_empty());
    }

    #[test]
    fn single_loop_record_omits_spring_series() {
        // Spring fields are only present for double-loop runs.
        let record = empty_record();
        assert!(record.spring_torque_reference.is_none());
        assert!(record.spring_torque_actual.is_none());
    }
}
