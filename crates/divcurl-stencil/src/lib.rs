//! Finite-difference divergence and curl for the divcurl pipeline.
//!
//! - [`kernel`]: 1D gradient kernels of order 2, 4 and 6, applied lane by
//!   lane along one axis of an n-dimensional array
//! - [`DifferentialOperator`]: combines partial derivatives into the four
//!   derived fields for planar and volumetric inputs
//!
//! Every axis, including the decomposition axis, is treated the same way.
//! Seams between workers are handled by the caller supplying enough ghost
//! samples ([`StencilOrder::halo`]) that only true domain edges fall back to
//! one-sided stencils.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod kernel;
pub mod operator;
pub mod order;

pub use kernel::{gradient, gradient_lane};
pub use operator::{DifferentialOperator, DifferentialOperatorBuilder};
pub use order::{GridSpacing, StencilOrder};
