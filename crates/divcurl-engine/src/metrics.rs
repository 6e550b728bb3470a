//! Per-step timing and per-worker run summaries.

use divcurl_core::StepIndex;
use divcurl_decomp::Partition;

/// Timing collected while one worker processes one step.
///
/// All durations are in microseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepMetrics {
    /// Step these timings belong to.
    pub step: StepIndex,
    /// Reading the ghosted window of every component.
    pub read_us: u64,
    /// Applying the operator and trimming the halo.
    pub compute_us: u64,
    /// Declaring, writing and closing the output step.
    pub write_us: u64,
    /// Wall-clock time for the whole step, including synchronization.
    pub total_us: u64,
}

/// Why a worker's step loop ended normally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// The source ran out of steps.
    EndOfStream,
    /// The configured `max_steps` was reached.
    StepLimit,
}

/// What one worker did during a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerReport {
    /// Worker index.
    pub worker: usize,
    /// The worker's owned partition, once the layout was known.
    pub partition: Option<Partition>,
    /// Steps fully processed and written.
    pub steps_processed: u64,
    /// How the loop ended.
    pub completion: Completion,
    /// Timings of every processed step, in order.
    pub metrics: Vec<StepMetrics>,
}

impl WorkerReport {
    /// Sum of `total_us` over every step.
    pub fn total_us(&self) -> u64 {
        self.metrics.iter().map(|m| m.total_us).sum()
    }
}

/// Reports of every worker of a successful run, in worker order.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// One entry per worker.
    pub workers: Vec<WorkerReport>,
}

impl RunReport {
    /// Steps processed by the run (identical on every worker).
    pub fn steps_processed(&self) -> u64 {
        self.workers.first().map_or(0, |w| w.steps_processed)
    }

    /// How the run ended.
    pub fn completion(&self) -> Option<Completion> {
        self.workers.first().map(|w| w.completion)
    }
}
