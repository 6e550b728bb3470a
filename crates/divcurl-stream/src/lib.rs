//! Step-oriented streams for the divcurl pipeline.
//!
//! Concrete implementations of the [`StepSource`](divcurl_core::StepSource)
//! and [`StepSink`](divcurl_core::StepSink) capabilities:
//!
//! - [`FileStepSource`] / [`SharedFileSink`] over a binary step-stream file
//! - [`MemoryStepSource`] / [`MemorySink`] over frames held in memory
//! - [`StepStreamWriter`] / [`StepStreamReader`] for whole frames
//!
//! # Format
//!
//! ```text
//! [MAGIC "DVCL"] [VERSION u8] [Frame 0] [Frame 1] ... [Frame N]
//! ```
//!
//! Each frame holds one step: every variable with its global shape and
//! the blocks written by the individual workers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod reader;
pub mod sink;
pub mod source;
pub mod types;
pub mod writer;

pub use reader::{FrameIter, StepStreamReader};
pub use sink::{FileStepSink, FrameTarget, MemorySink, SharedFileSink, SharedSink, WorkerSink};
pub use source::{FileStepSource, MemoryStepSource};
pub use types::{Block, StepFrame, VariableRecord};
pub use writer::StepStreamWriter;

/// Magic bytes at the start of every step-stream file.
pub const MAGIC: [u8; 4] = *b"DVCL";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;
