//! Run-level errors.
//!
//! A [`RunError`] is what a worker reports when the run stops abnormally.
//! It carries the worker index and, where known, the step and variable
//! in which the failure occurred.

use std::error::Error;
use std::fmt;

use divcurl_core::{CoreError, StepIndex};
use divcurl_decomp::DecompositionError;

use crate::config::ConfigError;

/// What went wrong.
#[derive(Debug)]
pub enum RunErrorKind {
    /// The configuration failed validation.
    Config(ConfigError),
    /// The decomposition request was invalid.
    Decomposition(DecompositionError),
    /// A pipeline component or stream backend failed.
    Core(CoreError),
    /// Another worker failed; this one aborted in lockstep.
    PeerAborted,
    /// The source stayed `NotReady` for every allowed attempt.
    NotReadyTimeout {
        /// Attempts made.
        attempts: u32,
    },
    /// The worker thread panicked.
    WorkerPanicked {
        /// Panic payload, when it was a string.
        message: String,
    },
    /// The worker thread could not be started.
    Spawn {
        /// Underlying I/O error message.
        reason: String,
    },
}

impl fmt::Display for RunErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Decomposition(e) => write!(f, "decomposition: {e}"),
            Self::Core(e) => write!(f, "{e}"),
            Self::PeerAborted => write!(f, "aborted because a peer worker failed"),
            Self::NotReadyTimeout { attempts } => {
                write!(f, "source not ready after {attempts} attempts")
            }
            Self::WorkerPanicked { message } => write!(f, "worker panicked: {message}"),
            Self::Spawn { reason } => write!(f, "failed to spawn worker thread: {reason}"),
        }
    }
}

/// A failed run, attributed to one worker.
#[derive(Debug)]
pub struct RunError {
    /// Index of the reporting worker.
    pub worker: usize,
    /// Step being processed, if the loop had opened one.
    pub step: Option<StepIndex>,
    /// Variable involved, if any.
    pub variable: Option<String>,
    /// The failure itself.
    pub kind: RunErrorKind,
}

impl RunError {
    /// An error not yet tied to a step or variable.
    pub fn new(worker: usize, kind: RunErrorKind) -> Self {
        let variable = match &kind {
            RunErrorKind::Core(e) => e.variable().map(str::to_string),
            _ => None,
        };
        Self {
            worker,
            step: None,
            variable,
            kind,
        }
    }

    /// Attach the step in which the error occurred.
    pub fn at_step(mut self, step: StepIndex) -> Self {
        self.step = Some(step);
        self
    }

    /// Whether this worker only stopped because a peer failed.
    pub fn is_peer_abort(&self) -> bool {
        matches!(self.kind, RunErrorKind::PeerAborted)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}", self.worker)?;
        if let Some(step) = self.step {
            write!(f, " step {step}")?;
        }
        if let Some(variable) = &self.variable {
            write!(f, " variable '{variable}'")?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl Error for RunError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            RunErrorKind::Config(e) => Some(e),
            RunErrorKind::Decomposition(e) => Some(e),
            RunErrorKind::Core(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for RunErrorKind {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<DecompositionError> for RunErrorKind {
    fn from(e: DecompositionError) -> Self {
        Self::Decomposition(e)
    }
}

impl From<CoreError> for RunErrorKind {
    fn from(e: CoreError) -> Self {
        Self::Core(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn core_error_names_its_variable() {
        let err = RunError::new(
            2,
            CoreError::ShapeMismatch {
                variable: "uy".into(),
                expected: smallvec![1, 8, 8],
                found: smallvec![1, 8, 9],
            }
            .into(),
        )
        .at_step(StepIndex(4));
        assert_eq!(err.variable.as_deref(), Some("uy"));
        let msg = err.to_string();
        assert!(msg.starts_with("worker 2 step 4 variable 'uy': "), "{msg}");
        assert!(err.source().is_some());
    }

    #[test]
    fn peer_abort_has_no_source() {
        let err = RunError::new(1, RunErrorKind::PeerAborted);
        assert!(err.is_peer_abort());
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "worker 1: aborted because a peer worker failed");
    }
}
