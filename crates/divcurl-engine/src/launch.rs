//! Worker launcher.
//!
//! [`launch`] starts `config.workers` named threads, each with its own
//! source and sink built by the caller's factories, and runs one
//! [`StepSequencer`] per thread over a shared [`ThreadCommunicator`]
//! group. Outcomes come back over a channel and are folded into a
//! [`RunReport`] or the most relevant [`RunError`].

use std::any::Any;
use std::thread;

use divcurl_core::{CoreError, StepSink, StepSource};

use crate::comm::{Communicator, ThreadCommunicator};
use crate::config::PipelineConfig;
use crate::context::ExecutionContext;
use crate::error::{RunError, RunErrorKind};
use crate::metrics::{RunReport, WorkerReport};
use crate::sequencer::StepSequencer;

/// Run the pipeline on `config.workers` threads.
///
/// `make_source(i)` and `make_sink(i)` are called on worker `i`'s own
/// thread, so neither the source nor the sink has to be `Send`.
///
/// # Errors
///
/// When several workers fail, the error of the lowest-indexed worker
/// that failed on its own is returned, in preference to any
/// [`RunErrorKind::PeerAborted`].
pub fn launch<S, K, FS, FK>(
    config: &PipelineConfig,
    make_source: FS,
    make_sink: FK,
) -> Result<RunReport, RunError>
where
    S: StepSource,
    K: StepSink,
    FS: Fn(usize) -> Result<S, CoreError> + Sync,
    FK: Fn(usize) -> Result<K, CoreError> + Sync,
{
    config.validate().map_err(|e| RunError::new(0, e.into()))?;
    let workers = config.workers;
    log::info!(
        "launching {workers} worker(s), stencil order {}",
        config.stencil_order
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut failures = Vec::new();

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for comm in ThreadCommunicator::group(workers) {
            let rank = comm.rank();
            let tx = tx.clone();
            // Created outside the closure so a failed spawn still leaves.
            let guard = comm.leave_guard();
            let (make_source, make_sink) = (&make_source, &make_sink);
            let spawned = thread::Builder::new()
                .name(format!("divcurl-worker-{rank}"))
                .spawn_scoped(scope, move || {
                    let _guard = guard;
                    let result = run_worker(comm, config, make_source, make_sink);
                    let _ = tx.send(result);
                });
            match spawned {
                Ok(handle) => handles.push((rank, handle)),
                Err(e) => failures.push(RunError::new(
                    rank,
                    RunErrorKind::Spawn {
                        reason: e.to_string(),
                    },
                )),
            }
        }
        for (rank, handle) in handles {
            if let Err(payload) = handle.join() {
                failures.push(RunError::new(
                    rank,
                    RunErrorKind::WorkerPanicked {
                        message: panic_message(payload),
                    },
                ));
            }
        }
    });
    drop(tx);

    let mut reports = Vec::with_capacity(workers);
    for result in rx.try_iter() {
        match result {
            Ok(report) => reports.push(report),
            Err(e) => failures.push(e),
        }
    }

    if !failures.is_empty() {
        failures.sort_by_key(|e| (e.is_peer_abort(), e.worker));
        let first = failures.remove(0);
        for other in &failures {
            log::debug!("also failed: {other}");
        }
        return Err(first);
    }
    reports.sort_by_key(|r| r.worker);
    Ok(RunReport { workers: reports })
}

/// Run the pipeline as a single worker on the calling thread.
///
/// `config.workers` is ignored.
pub fn run_solo(
    config: &PipelineConfig,
    source: &mut dyn StepSource,
    sink: &mut dyn StepSink,
) -> Result<WorkerReport, RunError> {
    let config = PipelineConfig {
        workers: 1,
        ..config.clone()
    };
    StepSequencer::new(ExecutionContext::solo(), &config)?.run(source, sink)
}

fn run_worker<S, K>(
    comm: ThreadCommunicator,
    config: &PipelineConfig,
    make_source: &(impl Fn(usize) -> Result<S, CoreError> + Sync),
    make_sink: &(impl Fn(usize) -> Result<K, CoreError> + Sync),
) -> Result<WorkerReport, RunError>
where
    S: StepSource,
    K: StepSink,
{
    let rank = comm.rank();
    let mut sequencer = StepSequencer::new(ExecutionContext::new(comm), config)?;
    let mut source = make_source(rank).map_err(|e| RunError::new(rank, e.into()))?;
    let mut sink = make_sink(rank).map_err(|e| RunError::new(rank, e.into()))?;
    sequencer.run(&mut source, &mut sink)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
