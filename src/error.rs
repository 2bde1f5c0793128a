use thiserror::Error;

use crate::evaluation::Phase;

/// Failures reported by the external collaborators (data store, model, generator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },
}

impl CollaboratorError {
    /// Errors that end the run when raised by a phase-level call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Credential(_))
    }

    /// Verdict text for a question-level failure.
    pub fn mismatch_reason(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{phase} phase failed: {source}")]
    Phase {
        phase: Phase,
        #[source]
        source: CollaboratorError,
    },

    #[error(
        "incomplete answers for table `{table}`: {answered} of {total} questions answered"
    )]
    IncompleteAnswers {
        table: String,
        answered: usize,
        total: usize,
    },

    #[error("answers reference unknown table `{0}`")]
    UnknownTable(String),

    #[error("invalid benchmark: {0}")]
    InvalidBenchmark(String),
}

impl EvalError {
    pub fn phase(phase: Phase, source: CollaboratorError) -> Self {
        Self::Phase { phase, source }
    }
}

pub type EvalResult<T> = Result<T, EvalError>;
