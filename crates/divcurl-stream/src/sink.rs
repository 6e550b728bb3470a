//! [`StepSink`] implementations: one shared output, one handle per worker.
//!
//! Each worker writes its own block of every variable through a
//! [`WorkerSink`] handle. Blocks are collected per step in the shared
//! state; once every handle has ended a step, the step is assembled into a
//! [`StepFrame`] and handed to the [`FrameTarget`] (a file writer or an
//! in-memory list). Steps are emitted in order.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use divcurl_core::{check_selection, CoreError, Shape, StepSink, StreamError};
use indexmap::IndexMap;
use ndarray::ArrayViewD;

use crate::types::{Block, StepFrame, VariableRecord};
use crate::writer::StepStreamWriter;

/// Where completed frames go.
pub trait FrameTarget: Send {
    /// Accept one completed frame.
    fn write_frame(&mut self, frame: &StepFrame) -> Result<(), StreamError>;

    /// Flush once every handle has closed.
    fn finish(&mut self) -> Result<(), StreamError>;
}

impl<W: Write + Send> FrameTarget for StepStreamWriter<W> {
    fn write_frame(&mut self, frame: &StepFrame) -> Result<(), StreamError> {
        StepStreamWriter::write_frame(self, frame)
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        self.flush()
    }
}

impl FrameTarget for Vec<StepFrame> {
    fn write_frame(&mut self, frame: &StepFrame) -> Result<(), StreamError> {
        self.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PendingStep {
    ended: usize,
    blocks: IndexMap<String, Vec<Block>>,
}

struct SinkState<T> {
    target: T,
    workers: usize,
    /// Global shape of every defined variable, in definition order.
    definitions: IndexMap<String, Shape>,
    pending: BTreeMap<u64, PendingStep>,
    next_step: u64,
    closed_handles: usize,
    finished: bool,
}

impl<T: FrameTarget> SinkState<T> {
    fn flush_ready(&mut self) -> Result<(), StreamError> {
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() != self.next_step || entry.get().ended < self.workers {
                break;
            }
            let (step, mut pending) = entry.remove_entry();
            let variables = self
                .definitions
                .iter()
                .filter_map(|(name, shape)| {
                    pending.blocks.swap_remove(name).map(|blocks| VariableRecord {
                        name: name.clone(),
                        global_shape: shape.clone(),
                        blocks,
                    })
                })
                .collect();
            self.target.write_frame(&StepFrame { step, variables })?;
            self.next_step += 1;
        }
        Ok(())
    }
}

/// The shared side of a multi-writer output stream.
pub struct SharedSink<T: FrameTarget> {
    state: Arc<Mutex<SinkState<T>>>,
}

/// Shared sink writing a step-stream file.
pub type SharedFileSink = SharedSink<StepStreamWriter<BufWriter<File>>>;

/// A worker's handle on a [`SharedFileSink`].
pub type FileStepSink = WorkerSink<StepStreamWriter<BufWriter<File>>>;

/// Shared sink collecting frames in memory.
pub type MemorySink = SharedSink<Vec<StepFrame>>;

fn lock<T>(state: &Mutex<SinkState<T>>) -> Result<MutexGuard<'_, SinkState<T>>, StreamError> {
    state.lock().map_err(|_| StreamError::Poisoned)
}

impl<T: FrameTarget> SharedSink<T> {
    /// Share `target` between `workers` handles.
    pub fn new(target: T, workers: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState {
                target,
                workers,
                definitions: IndexMap::new(),
                pending: BTreeMap::new(),
                next_step: 0,
                closed_handles: 0,
                finished: false,
            })),
        }
    }

    /// The handle for `worker`. Create exactly one per worker.
    pub fn handle(&self, worker: usize) -> WorkerSink<T> {
        WorkerSink {
            state: Arc::clone(&self.state),
            worker,
            blocks: IndexMap::new(),
            step: 0,
            open: false,
            closed: false,
        }
    }

    /// Number of complete steps emitted to the target.
    pub fn steps_written(&self) -> Result<u64, StreamError> {
        Ok(lock(&self.state)?.next_step)
    }

    /// Names and global shapes of the defined variables.
    pub fn definitions(&self) -> Result<Vec<(String, Shape)>, StreamError> {
        Ok(lock(&self.state)?
            .definitions
            .iter()
            .map(|(n, s)| (n.clone(), s.clone()))
            .collect())
    }

    /// Run `f` against the target.
    pub fn with_target<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, StreamError> {
        Ok(f(&lock(&self.state)?.target))
    }
}

impl SharedSink<StepStreamWriter<BufWriter<File>>> {
    /// Create (or truncate) a step-stream file shared by `workers` handles.
    pub fn create(path: impl AsRef<Path>, workers: usize) -> Result<Self, StreamError> {
        Ok(Self::new(StepStreamWriter::create(path)?, workers))
    }
}

impl SharedSink<Vec<StepFrame>> {
    /// An in-memory sink shared by `workers` handles.
    pub fn in_memory(workers: usize) -> Self {
        Self::new(Vec::new(), workers)
    }

    /// Frames emitted so far.
    pub fn frames(&self) -> Result<Vec<StepFrame>, StreamError> {
        self.with_target(|frames| frames.clone())
    }
}

/// One worker's handle on a [`SharedSink`].
pub struct WorkerSink<T: FrameTarget> {
    state: Arc<Mutex<SinkState<T>>>,
    worker: usize,
    /// This worker's declared block per variable.
    blocks: IndexMap<String, (Shape, Shape)>,
    step: u64,
    open: bool,
    closed: bool,
}

impl<T: FrameTarget> WorkerSink<T> {
    /// The worker this handle belongs to.
    pub fn worker(&self) -> usize {
        self.worker
    }

    fn ensure_usable(&self) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        Ok(())
    }
}

impl<T: FrameTarget> StepSink for WorkerSink<T> {
    fn begin_step(&mut self) -> Result<(), CoreError> {
        self.ensure_usable()?;
        if self.open {
            return Err(StreamError::StepInProgress.into());
        }
        lock(&self.state)?.pending.entry(self.step).or_default();
        self.open = true;
        Ok(())
    }

    fn define_variable(
        &mut self,
        name: &str,
        global_shape: &[usize],
        start: &[usize],
        count: &[usize],
    ) -> Result<(), CoreError> {
        self.ensure_usable()?;
        check_selection(name, global_shape, start, count)?;
        {
            let mut state = lock(&self.state)?;
            match state.definitions.get(name).cloned() {
                Some(existing) if existing.as_slice() != global_shape => {
                    return Err(StreamError::ConflictingDefinition {
                        name: name.to_string(),
                    }
                    .into());
                }
                Some(_) => {}
                None => {
                    state
                        .definitions
                        .insert(name.to_string(), global_shape.iter().copied().collect());
                }
            }
        }
        self.blocks.insert(
            name.to_string(),
            (start.iter().copied().collect(), count.iter().copied().collect()),
        );
        Ok(())
    }

    fn write(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> Result<(), CoreError> {
        self.ensure_usable()?;
        if !self.open {
            return Err(StreamError::NoActiveStep.into());
        }
        let (start, count) = self
            .blocks
            .get(name)
            .ok_or_else(|| StreamError::UndefinedVariable {
                name: name.to_string(),
            })?;
        let found: Shape = data.shape().iter().copied().collect();
        if &found != count {
            return Err(StreamError::BlockMismatch {
                name: name.to_string(),
                expected: count.clone(),
                found,
            }
            .into());
        }
        let block = Block::from_view(start, data);
        let mut state = lock(&self.state)?;
        let pending = state.pending.entry(self.step).or_default();
        pending.blocks.entry(name.to_string()).or_default().push(block);
        Ok(())
    }

    fn end_step(&mut self) -> Result<(), CoreError> {
        self.ensure_usable()?;
        if !self.open {
            return Err(StreamError::NoActiveStep.into());
        }
        self.open = false;
        let step = self.step;
        self.step += 1;
        let mut state = lock(&self.state)?;
        state.pending.entry(step).or_default().ended += 1;
        state.flush_ready()?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CoreError> {
        self.ensure_usable()?;
        self.closed = true;
        let mut state = lock(&self.state)?;
        state.closed_handles += 1;
        if state.closed_handles == state.workers && !state.finished {
            state.finished = true;
            if !state.pending.is_empty() {
                log::warn!(
                    "closing output with {} incomplete step(s)",
                    state.pending.len()
                );
            }
            state.target.finish()?;
        }
        Ok(())
    }
}
