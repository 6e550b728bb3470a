//! Collective operations between the workers of one run.
//!
//! Workers coordinate only through a [`Communicator`]: a barrier and an
//! all-reduce over a single `u64`. [`SoloCommunicator`] is the trivial
//! single-worker group; [`ThreadCommunicator`] connects the threads of
//! one process.
//!
//! A worker that leaves the group early (error before the step loop,
//! panic) marks the group as broken; every pending and future collective
//! then fails with [`PeerLeft`] instead of blocking forever.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Reduction applied by [`Communicator::all_reduce`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    /// Largest contribution.
    Max,
    /// Smallest contribution.
    Min,
    /// Sum of contributions (saturating).
    Sum,
}

impl ReduceOp {
    /// Combine two contributions.
    pub fn apply(self, a: u64, b: u64) -> u64 {
        match self {
            Self::Max => a.max(b),
            Self::Min => a.min(b),
            Self::Sum => a.saturating_add(b),
        }
    }
}

/// A peer left the group; the collective cannot complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerLeft;

impl fmt::Display for PeerLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a peer worker left the group")
    }
}

impl Error for PeerLeft {}

/// Collective operations over a fixed group of workers.
///
/// Every member must call the same collectives in the same order.
pub trait Communicator: Send {
    /// This worker's index in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Block until every worker has arrived.
    fn barrier(&self) -> Result<(), PeerLeft>;

    /// Combine one value from every worker; all receive the same result.
    fn all_reduce(&self, value: u64, op: ReduceOp) -> Result<u64, PeerLeft>;
}

// ── SoloCommunicator ────────────────────────────────────────────

/// The group of one.
#[derive(Clone, Copy, Debug, Default)]
pub struct SoloCommunicator;

impl Communicator for SoloCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> Result<(), PeerLeft> {
        Ok(())
    }

    fn all_reduce(&self, value: u64, _op: ReduceOp) -> Result<u64, PeerLeft> {
        Ok(value)
    }
}

// ── ThreadCommunicator ──────────────────────────────────────────

#[derive(Debug, Default)]
struct Round {
    arrived: usize,
    generation: u64,
    acc: Option<u64>,
    result: u64,
    broken: bool,
}

#[derive(Debug)]
struct Group {
    size: usize,
    round: Mutex<Round>,
    cv: Condvar,
}

impl Group {
    fn lock(&self) -> MutexGuard<'_, Round> {
        // A panicking member only ever poisons between rounds; the state
        // itself stays consistent, and `broken` carries the failure.
        self.round.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn leave(&self) {
        let mut round = self.lock();
        round.broken = true;
        self.cv.notify_all();
    }
}

/// One member of an in-process worker group.
///
/// Created in sets by [`ThreadCommunicator::group`]; each handle is moved
/// into its worker thread.
#[derive(Debug)]
pub struct ThreadCommunicator {
    rank: usize,
    group: Arc<Group>,
}

impl ThreadCommunicator {
    /// Handles for a group of `size` workers, in rank order.
    pub fn group(size: usize) -> Vec<Self> {
        let group = Arc::new(Group {
            size,
            round: Mutex::new(Round::default()),
            cv: Condvar::new(),
        });
        (0..size)
            .map(|rank| Self {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }

    /// Leave the group: wake every waiting peer and fail all later
    /// collectives.
    ///
    /// Rounds that already completed are unaffected.
    pub fn leave(&self) {
        self.group.leave();
    }

    /// A guard that leaves the group when dropped, including while
    /// unwinding from a panic.
    pub fn leave_guard(&self) -> LeaveGuard {
        LeaveGuard {
            group: Arc::clone(&self.group),
        }
    }
}

/// Leaves its group on drop. See [`ThreadCommunicator::leave_guard`].
#[derive(Debug)]
pub struct LeaveGuard {
    group: Arc<Group>,
}

impl Drop for LeaveGuard {
    fn drop(&mut self) {
        self.group.leave();
    }
}

impl Communicator for ThreadCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size
    }

    fn barrier(&self) -> Result<(), PeerLeft> {
        self.all_reduce(0, ReduceOp::Max).map(|_| ())
    }

    fn all_reduce(&self, value: u64, op: ReduceOp) -> Result<u64, PeerLeft> {
        let mut round = self.group.lock();
        if round.broken {
            return Err(PeerLeft);
        }
        round.acc = Some(match round.acc {
            Some(acc) => op.apply(acc, value),
            None => value,
        });
        round.arrived += 1;
        let generation = round.generation;

        if round.arrived == self.group.size {
            round.result = round.acc.take().unwrap_or(value);
            round.arrived = 0;
            round.generation += 1;
            self.group.cv.notify_all();
            return Ok(round.result);
        }

        while round.generation == generation && !round.broken {
            round = self
                .group
                .cv
                .wait(round)
                .unwrap_or_else(|e| e.into_inner());
        }
        if round.generation == generation {
            return Err(PeerLeft);
        }
        // The next round cannot complete before this worker joins it, so
        // `result` still holds this round's value.
        Ok(round.result)
    }
}
