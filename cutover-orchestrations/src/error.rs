//! Orchestration error taxonomy

use crate::platform::PlatformError;
use crate::resolver::ResolveError;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Caller error; raised before any platform call and never turned into
    /// a FAILURE response
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unknown orchestration: {0}")]
    UnknownOrchestration(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Invalid infra state: {0}")]
    InvalidInfraState(String),

    #[error(
        "Timed out after {timeout_in_mins} minute(s) waiting for application '{application}' \
         to reach {desired} running instance(s); {running} running"
    )]
    SteadyStateTimeout {
        application: String,
        desired: u32,
        running: u32,
        timeout_in_mins: u32,
    },

    #[error("Failed to prepare manifest: {0}")]
    Manifest(String),

    #[error("Artifact not available: {0}")]
    Artifact(String),

    #[error("Working directory error: {0}")]
    WorkingDirectory(#[from] std::io::Error),

    /// Forward failure followed by a best-effort revert
    #[error("{source}")]
    Reverted {
        source: Box<TaskError>,
        revert_errors: Vec<String>,
    },
}

impl TaskError {
    pub fn is_invalid_arguments(&self) -> bool {
        matches!(
            self,
            TaskError::InvalidArguments(_) | TaskError::UnknownOrchestration(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            TaskError::SteadyStateTimeout { .. } => true,
            TaskError::Reverted { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Attach revert failures to a forward error
    pub fn with_revert_errors(self, revert_errors: Vec<String>) -> Self {
        if revert_errors.is_empty() {
            self
        } else {
            TaskError::Reverted {
                source: Box::new(self),
                revert_errors,
            }
        }
    }
}
