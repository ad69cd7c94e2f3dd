//! Post-run export.
//!
//! The control core fixes the logical quantities of a run record; this
//! module is the thin collaborator that puts them on disk, as pretty JSON.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use sea_common::recorder::{Recorder, RecorderError, RunRecord};

/// Writes the run record to a JSON file.
#[derive(Debug)]
pub struct JsonRecorder {
    path: PathBuf,
}

impl JsonRecorder {
    /// Recorder targeting `path`; the file is created on `record`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Recorder for JsonRecorder {
    fn record(&mut self, run: &RunRecord) -> Result<(), RecorderError> {
        let file = File::create(&self.path)
            .map_err(|e| RecorderError::Write(format!("{}: {e}", self.path.display())))?;
        serde_json::to_writer_pretty(BufWriter::new(file), run)
            .map_err(|e| RecorderError::Write(format!("{}: {e}", self.path.display())))
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
