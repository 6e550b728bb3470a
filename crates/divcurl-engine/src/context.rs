//! Per-worker execution context.
//!
//! An [`ExecutionContext`] bundles a worker's identity, its handle on the
//! group's collectives, and the grid layout cached after the first step.

use divcurl_core::{Dimensionality, Shape};
use divcurl_decomp::GhostedFieldAccessor;

use crate::comm::{Communicator, PeerLeft, ReduceOp, SoloCommunicator};

/// What every worker proposes at a collective decision point.
///
/// Votes are combined with [`ReduceOp::Max`], so any failure outweighs
/// any request to finish, which outweighs continuing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Vote {
    /// Carry on with the next phase.
    Continue = 0,
    /// Stop cleanly after this point.
    Finish = 1,
    /// Stop because something failed.
    Fail = 2,
}

impl Vote {
    fn from_wire(v: u64) -> Self {
        match v {
            0 => Self::Continue,
            1 => Self::Finish,
            _ => Self::Fail,
        }
    }
}

/// Grid layout derived from the first step's global shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerLayout {
    /// Global shape of the input components.
    pub global_shape: Shape,
    /// How the operator interprets the grid.
    pub dimensionality: Dimensionality,
    /// This worker's partition, halo window and read/trim logic.
    pub accessor: GhostedFieldAccessor,
}

/// Identity, collectives and cached layout of one worker.
#[derive(Debug)]
pub struct ExecutionContext<C> {
    worker_index: usize,
    worker_count: usize,
    communicator: C,
    layout: Option<WorkerLayout>,
}

impl ExecutionContext<SoloCommunicator> {
    /// Context of a single-worker run.
    pub fn solo() -> Self {
        Self::new(SoloCommunicator)
    }
}

impl<C: Communicator> ExecutionContext<C> {
    /// Context for the worker `communicator` belongs to.
    pub fn new(communicator: C) -> Self {
        Self {
            worker_index: communicator.rank(),
            worker_count: communicator.size(),
            communicator,
            layout: None,
        }
    }

    /// This worker's index.
    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    /// Number of workers in the run.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// The underlying communicator.
    pub fn communicator(&self) -> &C {
        &self.communicator
    }

    /// Layout cached by [`cache_layout`](Self::cache_layout), if any.
    pub fn layout(&self) -> Option<&WorkerLayout> {
        self.layout.as_ref()
    }

    /// Remember the layout for every later step.
    pub fn cache_layout(&mut self, layout: WorkerLayout) -> &WorkerLayout {
        self.layout.insert(layout)
    }

    /// Wait for every worker.
    pub fn barrier(&self) -> Result<(), PeerLeft> {
        self.communicator.barrier()
    }

    /// Combine every worker's vote; all receive the strongest one.
    pub fn vote(&self, vote: Vote) -> Result<Vote, PeerLeft> {
        self.communicator
            .all_reduce(vote as u64, ReduceOp::Max)
            .map(Vote::from_wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::ThreadCommunicator;
    use std::thread;

    #[test]
    fn solo_context_echoes_votes() {
        let ctx = ExecutionContext::solo();
        assert_eq!(ctx.worker_index(), 0);
        assert_eq!(ctx.worker_count(), 1);
        assert_eq!(ctx.vote(Vote::Finish), Ok(Vote::Finish));
        assert!(ctx.layout().is_none());
    }

    #[test]
    fn strongest_vote_wins() {
        let votes = [Vote::Continue, Vote::Fail, Vote::Finish];
        let agreed: Vec<Vote> = thread::scope(|s| {
            let handles: Vec<_> = ThreadCommunicator::group(3)
                .into_iter()
                .zip(votes)
                .map(|(c, v)| {
                    s.spawn(move || ExecutionContext::new(c).vote(v).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(agreed, [Vote::Fail; 3]);
    }
}
