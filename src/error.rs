use std::{fmt, io, path::PathBuf};
use thiserror::Error;

/// Errors raised by the mod state engine.
#[derive(Debug, Error)]
pub enum ModError {
    #[error("mods folder not found: {}", path.display())]
    ModsRootNotFound { path: PathBuf },

    #[error("game folder not found: {}", path.display())]
    GameRootNotFound { path: PathBuf },

    #[error("invalid metadata in {}: {reason}", path.display())]
    InvalidMetadata { path: PathBuf, reason: String },

    #[error("failed to update {}", path.display())]
    Sentinel {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("apply incomplete: {} mod(s) failed", failures.len())]
    ApplyIncomplete { failures: Vec<SentinelFailure> },

    #[error("failed to read mod list")]
    SnapshotRead {
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What `apply` was trying to do to a sentinel when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelAction {
    Create,
    Remove,
}

#[derive(Debug)]
pub struct SentinelFailure {
    pub folder_name: String,
    pub action: SentinelAction,
    pub error: ModError,
}

impl fmt::Display for SentinelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            SentinelAction::Create => "disable",
            SentinelAction::Remove => "enable",
        };
        write!(f, "{verb} {}: {}", self.folder_name, self.error)?;
        if let ModError::Sentinel { source, .. } = &self.error {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}
