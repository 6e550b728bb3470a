//! Divcurl: streaming divergence and curl of vector fields.
//!
//! A run reads a step-oriented stream of vector-field components, splits
//! every step across a group of workers along its last (x) axis,
//! differentiates each worker's halo-extended slab with a central
//! finite-difference stencil, and writes `Div`, `Curl_x`, `Curl_y` and
//! `Curl_z` back as one step of an output stream.
//!
//! This is the top-level facade crate that re-exports the public API
//! from the divcurl sub-crates. For most uses, depending on `divcurl`
//! alone is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use divcurl::prelude::*;
//! use divcurl::stream::StepFrame;
//! use ndarray::{ArrayD, IxDyn};
//!
//! // ux = x, uy = y on a 4 x 6 grid: divergence 2, curl 0.
//! let ux = ArrayD::from_shape_fn(IxDyn(&[4, 6]), |i| i[1] as f64);
//! let uy = ArrayD::from_shape_fn(IxDyn(&[4, 6]), |i| i[0] as f64);
//! let frame = StepFrame::new(0)
//!     .with_variable("ux", &ux)
//!     .with_variable("uy", &uy);
//!
//! let config = PipelineConfig::with_max_steps(1);
//! let mut source = MemoryStepSource::from_frames([frame]);
//! let out = MemorySink::in_memory(1);
//! let report = run_solo(&config, &mut source, &mut out.handle(0)).unwrap();
//! assert_eq!(report.steps_processed, 1);
//!
//! let frames = out.frames().unwrap();
//! let div = frames[0].variable("Div").unwrap().assemble().unwrap();
//! assert!(div.iter().all(|&v| (v - 2.0).abs() < 1e-12));
//! ```
//!
//! # Crate organization
//!
//! | Module | Crate | Contents |
//! |--------|-------|----------|
//! | [`types`] | `divcurl-core` | Fields, shapes, errors, source/sink traits |
//! | [`decomp`] | `divcurl-decomp` | Partitioning and ghosted reads |
//! | [`stencil`] | `divcurl-stencil` | Finite-difference kernels and the operator |
//! | [`stream`] | `divcurl-stream` | File and in-memory step streams |
//! | [`engine`] | `divcurl-engine` | Configuration, sequencing, launching |
//! | [`cli`] | this crate | Command-line parsing and logging setup |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cli;

/// Core types: fields, shapes, step indices, errors, and the
/// [`StepSource`](types::StepSource) / [`StepSink`](types::StepSink)
/// capabilities.
pub use divcurl_core as types;

/// Domain decomposition: [`DomainDecomposer`](decomp::DomainDecomposer)
/// partitions and the halo-aware
/// [`GhostedFieldAccessor`](decomp::GhostedFieldAccessor).
pub use divcurl_decomp as decomp;

/// Stencils: [`StencilOrder`](stencil::StencilOrder),
/// [`GridSpacing`](stencil::GridSpacing) and the
/// [`DifferentialOperator`](stencil::DifferentialOperator).
pub use divcurl_stencil as stencil;

/// Step streams: the binary file format, file-backed and in-memory
/// sources, and the shared sink that merges worker blocks.
pub use divcurl_stream as stream;

/// Engine: [`PipelineConfig`](engine::PipelineConfig), the per-worker
/// [`StepSequencer`](engine::StepSequencer), and the
/// [`launch`](engine::launch) entry point.
pub use divcurl_engine as engine;

use divcurl_engine::{launch, PipelineConfig, RunError, RunErrorKind, RunReport};
use divcurl_stream::{FileStepSource, SharedFileSink};

/// Run the pipeline from `config.input` to `config.output`.
///
/// Every worker opens its own reader on the input file; all workers
/// write through one shared output file. The output is created (and
/// truncated) only after the configuration validates.
///
/// # Errors
///
/// Returns the first worker failure, or a worker-0 error if the
/// configuration is invalid or the output cannot be created.
pub fn run_files(config: &PipelineConfig) -> Result<RunReport, RunError> {
    config.validate().map_err(|e| RunError::new(0, e.into()))?;
    let input = config
        .require_input()
        .map_err(|e| RunError::new(0, e.into()))?;
    let sink = SharedFileSink::create(&config.output, config.workers)
        .map_err(|e| RunError::new(0, RunErrorKind::Core(e.into())))?;
    log::info!(
        "reading {} -> writing {}",
        input.display(),
        config.output.display()
    );
    launch(
        config,
        |_| FileStepSource::open(input),
        |rank| Ok(sink.handle(rank)),
    )
}

/// Common imports for typical divcurl usage.
///
/// ```rust
/// use divcurl::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use divcurl_core::{
        Component, DerivedFields, Dimensionality, StepIndex, StepSink, StepSource, StepStatus,
        VectorField,
    };

    // Errors
    pub use divcurl_core::{CoreError, StreamError};

    // Decomposition
    pub use divcurl_decomp::{DomainDecomposer, GhostedFieldAccessor, Partition};

    // Stencils
    pub use divcurl_stencil::{DifferentialOperator, GridSpacing, StencilOrder};

    // Streams
    pub use divcurl_stream::{FileStepSource, MemorySink, MemoryStepSource, SharedFileSink};

    // Engine
    pub use divcurl_engine::{
        launch, run_solo, PipelineConfig, RunError, RunErrorKind, RunReport, WorkerReport,
    };

    pub use crate::run_files;
}
