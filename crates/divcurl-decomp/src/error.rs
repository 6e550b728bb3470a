//! Error types for decomposition.

use std::fmt;

/// Errors arising from an invalid decomposition request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecompositionError {
    /// A decomposition over zero workers was requested.
    NoWorkers,
    /// The worker index is not below the worker count.
    WorkerOutOfRange {
        /// The offending index.
        index: usize,
        /// The number of workers.
        count: usize,
    },
    /// The decomposition axis does not exist in the grid.
    AxisOutOfRange {
        /// The requested axis.
        axis: usize,
        /// Number of axes in the grid.
        ndim: usize,
    },
    /// A partition reaches past the end of its axis.
    PartitionOutOfBounds {
        /// One past the partition's last index.
        end: usize,
        /// Extent of the axis.
        extent: usize,
    },
}

impl fmt::Display for DecompositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoWorkers => write!(f, "worker count must be at least 1"),
            Self::WorkerOutOfRange { index, count } => {
                write!(f, "worker index {index} out of range for {count} workers")
            }
            Self::AxisOutOfRange { axis, ndim } => {
                write!(f, "decomposition axis {axis} out of range for {ndim}-axis grid")
            }
            Self::PartitionOutOfBounds { end, extent } => {
                write!(f, "partition ends at {end}, past axis extent {extent}")
            }
        }
    }
}

impl std::error::Error for DecompositionError {}
