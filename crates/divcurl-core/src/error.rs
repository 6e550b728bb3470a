//! Error types for the divcurl pipeline.
//!
//! Organized by subsystem: [`StreamError`] covers the step-stream
//! backends (file format and protocol misuse), [`CoreError`] is what the
//! pipeline components return to the step sequencer.

use std::error::Error;
use std::fmt;
use std::io;

use crate::shape::Shape;

/// Errors raised by a step-stream backend.
#[derive(Debug)]
pub enum StreamError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The file does not start with the expected `b"DVCL"` magic bytes.
    InvalidMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the file.
        found: u8,
    },
    /// A frame could not be decoded (truncated or corrupt data).
    MalformedFrame {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A step-scoped call was made outside `begin_step`/`end_step`.
    NoActiveStep,
    /// `begin_step` was called while a step was already open.
    StepInProgress,
    /// `write` was called for a variable that was never defined.
    UndefinedVariable {
        /// Name of the variable.
        name: String,
    },
    /// A variable was redefined with a different global shape.
    ConflictingDefinition {
        /// Name of the variable.
        name: String,
    },
    /// A written block does not fit its declared selection.
    BlockMismatch {
        /// Name of the variable.
        name: String,
        /// Expected block shape (the declared count).
        expected: Shape,
        /// Shape of the array actually written.
        found: Shape,
    },
    /// The stream has been closed.
    Closed,
    /// A worker panicked while holding the shared stream state.
    Poisoned,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidMagic => write!(f, "invalid magic bytes (expected b\"DVCL\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {found}")
            }
            Self::MalformedFrame { detail } => write!(f, "malformed frame: {detail}"),
            Self::NoActiveStep => write!(f, "no step is active"),
            Self::StepInProgress => write!(f, "a step is already in progress"),
            Self::UndefinedVariable { name } => {
                write!(f, "variable '{name}' was written before being defined")
            }
            Self::ConflictingDefinition { name } => {
                write!(f, "variable '{name}' redefined with a different global shape")
            }
            Self::BlockMismatch {
                name,
                expected,
                found,
            } => write!(
                f,
                "block for '{name}' has shape {found:?}, declared count is {expected:?}"
            ),
            Self::Closed => write!(f, "stream is closed"),
            Self::Poisoned => write!(f, "shared stream state lock poisoned"),
        }
    }
}

impl Error for StreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Errors returned by pipeline components.
///
/// Every variant is fatal for the step in which it occurs; the sequencer
/// aborts the run rather than skipping the step, since downstream derived
/// fields would otherwise be schema-inconsistent across steps.
#[derive(Debug)]
pub enum CoreError {
    /// Two arrays that must share a shape do not.
    ShapeMismatch {
        /// Name of the offending variable.
        variable: String,
        /// The shape it was required to have.
        expected: Shape,
        /// The shape it actually has.
        found: Shape,
    },
    /// A field has fewer than 2 or more than 3 axes.
    UnsupportedDimensionality {
        /// Name of the offending variable.
        variable: String,
        /// Its shape.
        shape: Shape,
    },
    /// The source has no variable with this name in the current step.
    VariableNotFound {
        /// The requested name.
        name: String,
    },
    /// A start/count selection does not fit inside the global shape.
    InvalidSelection {
        /// Name of the variable being selected.
        variable: String,
        /// Description of the violated bound.
        reason: String,
    },
    /// The step-stream backend failed.
    Stream(StreamError),
}

impl CoreError {
    /// Name of the variable this error concerns, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::ShapeMismatch { variable, .. }
            | Self::UnsupportedDimensionality { variable, .. }
            | Self::InvalidSelection { variable, .. } => Some(variable),
            Self::VariableNotFound { name } => Some(name),
            Self::Stream(StreamError::UndefinedVariable { name })
            | Self::Stream(StreamError::ConflictingDefinition { name })
            | Self::Stream(StreamError::BlockMismatch { name, .. }) => Some(name),
            Self::Stream(_) => None,
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch {
                variable,
                expected,
                found,
            } => write!(
                f,
                "shape mismatch for '{variable}': expected {expected:?}, found {found:?}"
            ),
            Self::UnsupportedDimensionality { variable, shape } => write!(
                f,
                "'{variable}' has shape {shape:?}; only 2 or 3 spatial axes are supported"
            ),
            Self::VariableNotFound { name } => write!(f, "variable '{name}' not found"),
            Self::InvalidSelection { variable, reason } => {
                write!(f, "invalid selection for '{variable}': {reason}")
            }
            Self::Stream(e) => write!(f, "stream: {e}"),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StreamError> for CoreError {
    fn from(e: StreamError) -> Self {
        Self::Stream(e)
    }
}

impl From<io::Error> for CoreError {
    fn from(e: io::Error) -> Self {
        Self::Stream(StreamError::Io(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn shape_mismatch_names_variable() {
        let err = CoreError::ShapeMismatch {
            variable: "uy".into(),
            expected: smallvec![1, 8, 8],
            found: smallvec![1, 8, 7],
        };
        assert_eq!(err.variable(), Some("uy"));
        let msg = err.to_string();
        assert!(msg.contains("uy"), "{msg}");
        assert!(msg.contains("[1, 8, 7]"), "{msg}");
    }

    #[test]
    fn stream_error_is_source() {
        let err = CoreError::from(StreamError::InvalidMagic);
        assert!(err.source().is_some());
        assert_eq!(err.variable(), None);
    }

    #[test]
    fn io_error_converts_through_stream() {
        let io = io::Error::new(io::ErrorKind::NotFound, "missing");
        match CoreError::from(io) {
            CoreError::Stream(StreamError::Io(e)) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound)
            }
            other => panic!("expected Stream(Io), got {other:?}"),
        }
    }
}
