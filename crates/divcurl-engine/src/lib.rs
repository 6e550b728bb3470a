//! Step sequencing and worker coordination for the divcurl pipeline.
//!
//! Provides the per-worker [`StepSequencer`] that drives the
//! read → differentiate → write cycle, the collectives workers use to
//! stay in lockstep, and the launcher that runs a group of workers.
//!
//! - [`PipelineConfig`] / [`FileConfig`]: run configuration, optionally
//!   layered from TOML
//! - [`Communicator`]: barrier and all-reduce ([`SoloCommunicator`],
//!   [`ThreadCommunicator`])
//! - [`ExecutionContext`]: worker identity plus the cached grid layout
//! - [`ResultSchemaRegistry`]: declare-once bookkeeping for outputs
//! - [`launch`] / [`run_solo`]: entry points returning a [`RunReport`]

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod config;
pub mod context;
pub mod error;
pub mod launch;
pub mod metrics;
pub mod schema;
pub mod sequencer;

pub use comm::{Communicator, LeaveGuard, PeerLeft, ReduceOp, SoloCommunicator, ThreadCommunicator};
pub use config::{
    ComponentNames, ConfigError, FileComponents, FileConfig, FilePoll, FileSpacing,
    PipelineConfig, PollConfig, DEFAULT_OUTPUT,
};
pub use context::{ExecutionContext, Vote, WorkerLayout};
pub use error::{RunError, RunErrorKind};
pub use launch::{launch, run_solo};
pub use metrics::{Completion, RunReport, StepMetrics, WorkerReport};
pub use schema::{Declaration, ResultSchemaRegistry, VariableLayout};
pub use sequencer::{SequencerState, StepSequencer, StepState};
