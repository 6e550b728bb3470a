//! Core types and traits for the divcurl pipeline.
//!
//! This is the leaf crate with no internal dependencies. It defines the
//! vocabulary shared by every other crate in the workspace: step
//! identifiers, grid shapes and selections, vector and derived fields,
//! the error taxonomy, and the [`StepSource`]/[`StepSink`] capability
//! traits through which the pipeline talks to a step-oriented I/O backend.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod field;
pub mod id;
pub mod shape;
pub mod traits;

pub use error::{CoreError, StreamError};
pub use field::{Component, DerivedFields, Dimensionality, VectorField, DERIVED_NAMES};
pub use id::StepIndex;
pub use shape::{check_selection, select, shape_of, Shape};
pub use traits::{StepSink, StepSource, StepStatus};
