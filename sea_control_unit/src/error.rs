//! Session-level error taxonomy.
//!
//! Configuration errors are reported before any hardware motion occurs;
//! rig I/O errors terminate the running session after a best-effort safe
//! stop; recorder errors surface from the drain phase.

use sea_common::config::ConfigError;
use sea_common::recorder::RecorderError;
use sea_common::rig::RigError;
use thiserror::Error;

/// Fatal session error.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid configuration — the session never left `Idle`.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Hardware I/O failure during the run.
    #[error("rig I/O: {0}")]
    Rig(#[from] RigError),

    /// The run record could not be persisted.
    #[error("recorder: {0}")]
    Recorder(#[from] RecorderError),
}
