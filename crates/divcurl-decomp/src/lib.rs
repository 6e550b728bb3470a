//! Domain decomposition for divcurl workers.
//!
//! A structured grid is split along a single axis (the decomposition
//! axis, conventionally the last one) into contiguous slabs, one per
//! worker. Finite-difference stencils need neighbour samples at slab
//! seams, so each worker reads a slightly wider window (its slab plus a
//! halo of ghost samples on every interior side) and trims the halo off
//! again before writing.
//!
//! - [`DomainDecomposer`] computes [`Partition`]s
//! - [`HaloWindow`] extends a partition by the halo width
//! - [`GhostedFieldAccessor`] issues the windowed reads and trims results

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod halo;
pub mod partition;

pub use error::DecompositionError;
pub use halo::{GhostedFieldAccessor, HaloWindow};
pub use partition::{decompose, decompose_all, DomainDecomposer, Partition};
