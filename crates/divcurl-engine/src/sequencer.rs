//! The per-worker step loop.
//!
//! Every worker runs one [`StepSequencer`] over its own [`StepSource`]
//! and its handle on the shared [`StepSink`]. Workers move through each
//! step in lockstep:
//!
//! ```text
//! begin_step (poll while NotReady)
//!   barrier, vote: all have a step?      -- any end/failure stops everyone
//! sink.begin_step
//!   layout (first step), windowed read, operator, trim
//!   vote: anyone failed?                 -- failure aborts everyone
//! declare (first step), write
//! source.end_step, sink.end_step         -- always, on both sides
//!   barrier, vote: continue/finish/fail
//! ```
//!
//! Decisions are made collectively, so no worker waits at a barrier its
//! peers will never reach. The worker that failed reports its own error;
//! its peers report [`RunErrorKind::PeerAborted`].

use std::thread;
use std::time::Instant;

use divcurl_core::{
    CoreError, DerivedFields, Dimensionality, StepIndex, StepSink, StepSource, StepStatus,
    DERIVED_NAMES,
};
use divcurl_decomp::{DomainDecomposer, GhostedFieldAccessor};
use divcurl_stencil::DifferentialOperator;

use crate::comm::Communicator;
use crate::config::PipelineConfig;
use crate::context::{ExecutionContext, Vote, WorkerLayout};
use crate::error::{RunError, RunErrorKind};
use crate::metrics::{Completion, StepMetrics, WorkerReport};
use crate::schema::{Declaration, ResultSchemaRegistry};

/// Where a worker is within the step cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerState {
    /// Constructed; no step requested yet.
    Idle,
    /// Waiting for the source to open a step.
    StepRequested,
    /// A step is open on both sides; reading and computing.
    StepActive,
    /// Output variables are being declared.
    VariablesBound,
    /// Derived fields are being written.
    Writing,
    /// The step was closed on both sides.
    StepClosed,
    /// The loop ended normally.
    Terminated,
    /// The loop ended because this worker or a peer failed.
    Aborted,
}

impl SequencerState {
    fn in_step(self) -> bool {
        matches!(
            self,
            Self::StepActive | Self::VariablesBound | Self::Writing | Self::StepClosed
        )
    }
}

/// Progress of the current run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepState {
    /// Index of the current (or last) step.
    pub step_index: StepIndex,
    /// Whether the output variables have been declared.
    pub schema_declared: bool,
    /// Whether the loop has ended.
    pub terminal: bool,
}

enum Flow {
    Continue,
    Done(Completion),
}

/// Drives one worker through the step loop.
pub struct StepSequencer<C> {
    ctx: ExecutionContext<C>,
    config: PipelineConfig,
    operator: DifferentialOperator,
    registry: ResultSchemaRegistry,
    state: SequencerState,
    step: StepState,
    steps_processed: u64,
    metrics: Vec<StepMetrics>,
}

impl<C: Communicator> StepSequencer<C> {
    /// Validate `config` and prepare a sequencer for the worker `ctx`
    /// describes.
    pub fn new(ctx: ExecutionContext<C>, config: &PipelineConfig) -> Result<Self, RunError> {
        let worker = ctx.worker_index();
        config
            .validate()
            .map_err(|e| RunError::new(worker, e.into()))?;
        let operator = config
            .operator()
            .map_err(|e| RunError::new(worker, e.into()))?;
        Ok(Self {
            ctx,
            config: config.clone(),
            operator,
            registry: ResultSchemaRegistry::new(),
            state: SequencerState::Idle,
            step: StepState::default(),
            steps_processed: 0,
            metrics: Vec::new(),
        })
    }

    /// Current position in the step cycle.
    pub fn state(&self) -> SequencerState {
        self.state
    }

    /// Progress of the run.
    pub fn step_state(&self) -> &StepState {
        &self.step
    }

    /// Output variables declared so far.
    pub fn registry(&self) -> &ResultSchemaRegistry {
        &self.registry
    }

    /// This worker's execution context.
    pub fn context(&self) -> &ExecutionContext<C> {
        &self.ctx
    }

    /// Run the loop until end of stream, the step limit, or a failure.
    ///
    /// The sink is closed in every case; a close failure after an
    /// earlier error is logged and the earlier error returned.
    pub fn run(
        &mut self,
        source: &mut dyn StepSource,
        sink: &mut dyn StepSink,
    ) -> Result<WorkerReport, RunError> {
        let outcome = self.step_loop(source, sink);
        self.step.terminal = true;
        let closed = sink.close();
        let completion = match outcome {
            Ok(completion) => completion,
            Err(e) => {
                if let Err(close_err) = closed {
                    log::warn!(
                        "worker {}: closing output after failure: {close_err}",
                        self.ctx.worker_index()
                    );
                }
                self.transition(SequencerState::Aborted);
                if e.is_peer_abort() {
                    log::debug!("{e}");
                } else {
                    log::error!("{e}");
                }
                return Err(e);
            }
        };
        if let Err(e) = closed {
            self.transition(SequencerState::Aborted);
            return Err(self.error(e.into()));
        }
        self.transition(SequencerState::Terminated);
        log::info!(
            "worker {}: finished after {} step(s) ({completion:?})",
            self.ctx.worker_index(),
            self.steps_processed
        );
        Ok(WorkerReport {
            worker: self.ctx.worker_index(),
            partition: self.ctx.layout().map(|l| *l.accessor.partition()),
            steps_processed: self.steps_processed,
            completion,
            metrics: std::mem::take(&mut self.metrics),
        })
    }

    fn step_loop(
        &mut self,
        source: &mut dyn StepSource,
        sink: &mut dyn StepSink,
    ) -> Result<Completion, RunError> {
        loop {
            if let Flow::Done(completion) = self.process_step(source, sink)? {
                return Ok(completion);
            }
        }
    }

    fn process_step(
        &mut self,
        source: &mut dyn StepSource,
        sink: &mut dyn StepSink,
    ) -> Result<Flow, RunError> {
        let started = Instant::now();

        // ── Open ──
        self.transition(SequencerState::StepRequested);
        let requested = self.request_step(source);
        let local = match &requested {
            Ok(StepStatus::Ok) => Vote::Continue,
            Ok(_) => Vote::Finish,
            Err(_) => Vote::Fail,
        };
        let agreed = self.agree(local, true);
        if agreed != Vote::Continue {
            if local == Vote::Continue {
                if let Err(e) = source.end_step() {
                    log::warn!("worker {}: closing unused step: {e}", self.ctx.worker_index());
                }
            }
            return match (agreed, requested) {
                (Vote::Finish, _) => Ok(Flow::Done(Completion::EndOfStream)),
                (_, Err(e)) => Err(e),
                _ => Err(self.peer_aborted()),
            };
        }
        self.step.step_index = source.current_step();
        self.transition(SequencerState::StepActive);
        let mut metrics = StepMetrics {
            step: self.step.step_index,
            ..StepMetrics::default()
        };

        // ── Compute ──
        let opened = sink.begin_step();
        let sink_open = opened.is_ok();
        let computed = match opened {
            Ok(()) => self.compute(source, &mut metrics),
            Err(e) => Err(self.error(e.into())),
        };
        let local = if computed.is_err() {
            Vote::Fail
        } else {
            Vote::Continue
        };
        let peers = self.agree(local, false);

        // ── Write and close ──
        let write_started = Instant::now();
        let written = match &computed {
            Ok((layout, fields)) if peers == Vote::Continue => {
                self.write(sink, layout, fields.as_ref())
            }
            _ => Ok(()),
        };
        let source_closed = source.end_step().map_err(|e| self.error(e.into()));
        let sink_closed = if sink_open {
            sink.end_step().map_err(|e| self.error(e.into()))
        } else {
            Ok(())
        };
        metrics.write_us = micros(write_started);
        self.transition(SequencerState::StepClosed);

        if peers == Vote::Fail {
            return Err(computed.err().unwrap_or_else(|| self.peer_aborted()));
        }
        let local = computed.and(written).and(source_closed).and(sink_closed);

        // ── Decide ──
        let vote = match &local {
            Err(_) => Vote::Fail,
            Ok(()) if self.config.is_last_step(self.step.step_index.0) => Vote::Finish,
            Ok(()) => Vote::Continue,
        };
        let agreed = self.agree(vote, true);
        if agreed == Vote::Fail {
            return Err(local.err().unwrap_or_else(|| self.peer_aborted()));
        }

        metrics.total_us = micros(started);
        self.steps_processed += 1;
        if self.ctx.worker_index() == 0 {
            log::info!(
                "step {}: derived fields written in {} us",
                self.step.step_index,
                metrics.total_us
            );
        }
        self.metrics.push(metrics);

        Ok(match agreed {
            Vote::Finish => Flow::Done(Completion::StepLimit),
            _ => Flow::Continue,
        })
    }

    /// Open the next step, sleeping between `NotReady` answers.
    fn request_step(&self, source: &mut dyn StepSource) -> Result<StepStatus, RunError> {
        let poll = self.config.poll;
        let mut attempts = 0u32;
        loop {
            let status = source.begin_step().map_err(|e| self.error(e.into()))?;
            if status != StepStatus::NotReady {
                return Ok(status);
            }
            attempts += 1;
            if attempts >= poll.max_attempts {
                return Err(self.error(RunErrorKind::NotReadyTimeout { attempts }));
            }
            if attempts == 1 {
                log::warn!(
                    "worker {}: source not ready, polling every {} ms",
                    self.ctx.worker_index(),
                    poll.interval_ms
                );
            }
            thread::sleep(poll.interval());
        }
    }

    /// Read, differentiate and trim this worker's window.
    ///
    /// A worker owning no samples reads nothing and yields `None`.
    fn compute(
        &mut self,
        source: &mut dyn StepSource,
        metrics: &mut StepMetrics,
    ) -> Result<(WorkerLayout, Option<DerivedFields>), RunError> {
        let layout = self.layout(source)?;
        if layout.accessor.is_degenerate() {
            return Ok((layout, None));
        }

        let names = &self.config.components;
        let uz = layout.dimensionality.needs_z().then_some(names.uz.as_str());
        let read_started = Instant::now();
        let field = layout
            .accessor
            .read_field(source, layout.dimensionality, &names.ux, &names.uy, uz)
            .map_err(|e| self.error(e.into()))?;
        metrics.read_us = micros(read_started);

        let compute_started = Instant::now();
        let fields = self
            .operator
            .apply(&field)
            .and_then(|window| layout.accessor.trim_all(window))
            .map_err(|e| self.error(e.into()))?;
        metrics.compute_us = micros(compute_started);
        Ok((layout, Some(fields)))
    }

    /// The cached layout, computed from the first step's shapes.
    ///
    /// Later steps must keep the first step's global shape.
    fn layout(&mut self, source: &mut dyn StepSource) -> Result<WorkerLayout, RunError> {
        let names = &self.config.components;
        let shape = source
            .inquire_shape(&names.ux)
            .map_err(|e| self.error(e.into()))?;
        if let Some(layout) = self.ctx.layout() {
            if layout.global_shape != shape {
                return Err(self.error(
                    CoreError::ShapeMismatch {
                        variable: names.ux.clone(),
                        expected: layout.global_shape.clone(),
                        found: shape,
                    }
                    .into(),
                ));
            }
            return Ok(layout.clone());
        }

        let uy = source
            .inquire_shape(&names.uy)
            .map_err(|e| self.error(e.into()))?;
        if uy != shape {
            return Err(self.error(
                CoreError::ShapeMismatch {
                    variable: names.uy.clone(),
                    expected: shape,
                    found: uy,
                }
                .into(),
            ));
        }
        let uz = match source.inquire_shape(&names.uz) {
            Ok(found) => Some(found),
            Err(CoreError::VariableNotFound { .. }) => None,
            Err(e) => return Err(self.error(e.into())),
        };
        let dimensionality = Dimensionality::classify(&names.ux, &shape, uz.is_some())
            .map_err(|e| self.error(e.into()))?;
        if let (true, Some(found)) = (dimensionality.needs_z(), uz) {
            if found != shape {
                return Err(self.error(
                    CoreError::ShapeMismatch {
                        variable: names.uz.clone(),
                        expected: shape,
                        found,
                    }
                    .into(),
                ));
            }
        }

        let axis = shape.len() - 1;
        let partition = DomainDecomposer::new(self.ctx.worker_count())
            .and_then(|d| d.partition(axis, shape[axis], self.ctx.worker_index()))
            .map_err(|e| self.error(e.into()))?;
        let accessor = GhostedFieldAccessor::new(partition, &shape, self.config.halo())
            .map_err(|e| self.error(e.into()))?;
        let window = accessor.window();
        log::debug!(
            "worker {}: {dimensionality:?} grid {:?}, owns [{}, {}) of axis {axis}, reads [{}, {})",
            self.ctx.worker_index(),
            shape.as_slice(),
            partition.start,
            partition.end(),
            window.read_start,
            window.read_end()
        );
        if partition.is_degenerate() {
            log::debug!(
                "worker {}: owns no samples of axis {axis}; idling through steps",
                self.ctx.worker_index()
            );
        }
        let layout = WorkerLayout {
            global_shape: shape,
            dimensionality,
            accessor,
        };
        Ok(self.ctx.cache_layout(layout).clone())
    }

    /// Declare the outputs on the first step, then write this worker's
    /// block of each.
    fn write(
        &mut self,
        sink: &mut dyn StepSink,
        layout: &WorkerLayout,
        fields: Option<&DerivedFields>,
    ) -> Result<(), RunError> {
        if !self.step.schema_declared {
            self.transition(SequencerState::VariablesBound);
            let (start, count) = layout.accessor.write_selection();
            for name in DERIVED_NAMES {
                let declared =
                    self.registry
                        .declare_once(name, &layout.global_shape, &start, &count);
                if declared == Declaration::Declared {
                    sink.define_variable(name, &layout.global_shape, &start, &count)
                        .map_err(|e| self.error(e.into()))?;
                }
            }
            self.step.schema_declared = true;
        }

        self.transition(SequencerState::Writing);
        if let Some(fields) = fields {
            for (name, array) in fields.iter() {
                sink.write(name, array.view())
                    .map_err(|e| self.error(e.into()))?;
            }
        }
        Ok(())
    }

    /// Barrier (when `sync`) and vote; a departed peer counts as failure.
    fn agree(&self, vote: Vote, sync: bool) -> Vote {
        let barrier = if sync { self.ctx.barrier() } else { Ok(()) };
        barrier
            .and_then(|()| self.ctx.vote(vote))
            .unwrap_or(Vote::Fail)
    }

    fn transition(&mut self, next: SequencerState) {
        log::trace!(
            "worker {}: {:?} -> {next:?}",
            self.ctx.worker_index(),
            self.state
        );
        self.state = next;
    }

    fn error(&self, kind: RunErrorKind) -> RunError {
        let err = RunError::new(self.ctx.worker_index(), kind);
        if self.state.in_step() {
            err.at_step(self.step.step_index)
        } else {
            err
        }
    }

    fn peer_aborted(&self) -> RunError {
        self.error(RunErrorKind::PeerAborted)
    }
}

fn micros(since: Instant) -> u64 {
    since.elapsed().as_micros() as u64
}
