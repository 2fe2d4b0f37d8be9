use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Failure to run a command at all, as opposed to a command that ran and exited nonzero
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("executable not found: {program}")]
    NotFound { program: String },

    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("i/o error while talking to {program}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },
}

impl InvokeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, InvokeError::TimedOut { .. })
    }
}

/// Errors fatal to the evaluation of a single problem
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("invocation failed")]
    Invocation(#[from] InvokeError),

    #[error("failed to write source file {}", path.display())]
    Materialize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
