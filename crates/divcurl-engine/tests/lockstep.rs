//! Integration test: collective termination and failure handling.
//!
//! Workers own independent sources, so they can disagree about whether a
//! step exists or whether it can be processed. These tests check that
//! every such disagreement is resolved collectively: nobody hangs, every
//! opened step is closed on both sides, and the worker that failed is the
//! one whose error is reported.

use divcurl_core::{CoreError, StepIndex};
use divcurl_engine::{launch, Completion, PipelineConfig, PollConfig, RunErrorKind};
use divcurl_stream::{MemorySink, MemoryStepSource, StepFrame};
use divcurl_test_utils::{derived_from_frame, linear_grid, vector_frames};

/// `ux = x`, `uy = 3y`: divergence 4, curl 0 everywhere.
fn planar(shape: &[usize], steps: u64) -> Vec<StepFrame> {
    let n = shape.len();
    let coeffs_x: Vec<f64> = (0..n).map(|a| f64::from(a + 1 == n)).collect();
    let coeffs_y: Vec<f64> = (0..n).map(|a| 3.0 * f64::from(a + 2 == n)).collect();
    vector_frames(steps, |_| {
        (
            linear_grid(shape, &coeffs_x),
            linear_grid(shape, &coeffs_y),
            None,
        )
    })
}

fn config(workers: usize, max_steps: i64) -> PipelineConfig {
    let mut cfg = PipelineConfig::with_max_steps(max_steps);
    cfg.workers = workers;
    cfg.poll = PollConfig {
        interval_ms: 1,
        max_attempts: 50,
    };
    cfg
}

#[test]
fn stops_after_max_steps_on_every_worker() {
    let frames = planar(&[1, 8, 8], 10);
    let out = MemorySink::in_memory(2);
    let report = launch(
        &config(2, 3),
        |_| Ok(MemoryStepSource::from_frames(frames.clone())),
        |rank| Ok(out.handle(rank)),
    )
    .unwrap();

    assert_eq!(report.steps_processed(), 3);
    assert_eq!(report.completion(), Some(Completion::StepLimit));
    for (rank, worker) in report.workers.iter().enumerate() {
        assert_eq!(worker.worker, rank);
        assert_eq!(worker.steps_processed, 3);
        assert_eq!(worker.metrics.len(), 3);
        assert_eq!(worker.partition.map(|p| p.count), Some(4));
    }

    let written = out.frames().unwrap();
    assert_eq!(written.len(), 3);
    for frame in &written {
        let derived = derived_from_frame(frame);
        assert_eq!(derived.shape().as_slice(), &[1, 8, 8]);
        assert!(derived.div.iter().all(|&v| (v - 4.0).abs() < 1e-12));
        assert!(derived.curl_z.iter().all(|&v| v.abs() < 1e-12));
    }
}

#[test]
fn shortest_stream_ends_the_run() {
    let long = planar(&[6, 10], 5);
    let short = planar(&[6, 10], 2);
    let out = MemorySink::in_memory(3);
    let report = launch(
        &config(3, 100),
        |rank| {
            let frames = if rank == 1 { &short } else { &long };
            Ok(MemoryStepSource::from_frames(frames.iter().cloned()))
        },
        |rank| Ok(out.handle(rank)),
    )
    .unwrap();
    assert_eq!(report.steps_processed(), 2);
    assert_eq!(report.completion(), Some(Completion::EndOfStream));
    assert_eq!(out.frames().unwrap().len(), 2);
}

#[test]
fn surplus_workers_idle_but_stay_in_lockstep() {
    let frames = planar(&[1, 8, 3], 2);
    let out = MemorySink::in_memory(5);
    let report = launch(
        &config(5, 10),
        |_| Ok(MemoryStepSource::from_frames(frames.clone())),
        |rank| Ok(out.handle(rank)),
    )
    .unwrap();

    let counts: Vec<_> = report
        .workers
        .iter()
        .map(|w| w.partition.map(|p| p.count))
        .collect();
    assert_eq!(counts, [Some(1), Some(1), Some(1), Some(0), Some(0)]);
    assert!(report.workers.iter().all(|w| w.steps_processed == 2));
    for w in &report.workers[3..] {
        assert!(w.metrics.iter().all(|m| m.read_us == 0 && m.compute_us == 0));
    }

    let written = out.frames().unwrap();
    assert_eq!(written.len(), 2);
    let div = written[0].variable("Div").unwrap();
    assert_eq!(div.blocks.len(), 3);
    let derived = derived_from_frame(&written[1]);
    assert!(derived.div.iter().all(|&v| (v - 4.0).abs() < 1e-12));
}

#[test]
fn one_worker_failing_aborts_all() {
    let good = planar(&[1, 8, 12], 4);
    let mut bad = good.clone();
    bad[1] = StepFrame::new(1)
        .with_variable("ux", &linear_grid(&[1, 8, 13], &[0.0, 0.0, 1.0]))
        .with_variable("uy", &linear_grid(&[1, 8, 13], &[0.0, 1.0, 0.0]));
    let out = MemorySink::in_memory(3);
    let err = launch(
        &config(3, 100),
        |rank| {
            let frames = if rank == 2 { &bad } else { &good };
            Ok(MemoryStepSource::from_frames(frames.iter().cloned()))
        },
        |rank| Ok(out.handle(rank)),
    )
    .unwrap_err();

    assert_eq!(err.worker, 2);
    assert_eq!(err.step, Some(StepIndex(1)));
    assert_eq!(err.variable.as_deref(), Some("ux"));
    match err.kind {
        RunErrorKind::Core(CoreError::ShapeMismatch { expected, found, .. }) => {
            assert_eq!(expected.as_slice(), &[1, 8, 12]);
            assert_eq!(found.as_slice(), &[1, 8, 13]);
        }
        other => panic!("expected ShapeMismatch, got {other:?}"),
    }

    // Step 0 is complete; step 1 was closed by everyone without output.
    let written = out.frames().unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].variables.len(), 4);
    assert!(written[1].variables.is_empty());
}

#[test]
fn slow_producer_is_polled() {
    let frames = planar(&[1, 4, 8], 3);
    let out = MemorySink::in_memory(2);
    let report = launch(
        &config(2, 100),
        |rank| {
            let mut source = MemoryStepSource::new();
            for frame in &frames {
                if rank == 0 {
                    source.push_not_ready();
                    source.push_not_ready();
                }
                source.push_frame(frame.clone());
            }
            Ok(source)
        },
        |rank| Ok(out.handle(rank)),
    )
    .unwrap();
    assert_eq!(report.steps_processed(), 3);
}

#[test]
fn producer_that_never_delivers_times_out() {
    let frames = planar(&[1, 4, 8], 1);
    let out = MemorySink::in_memory(2);
    let mut cfg = config(2, 100);
    cfg.poll.max_attempts = 4;
    let err = launch(
        &cfg,
        |rank| {
            if rank != 1 {
                return Ok(MemoryStepSource::from_frames(frames.clone()));
            }
            let mut stalled = MemoryStepSource::new();
            for _ in 0..10 {
                stalled.push_not_ready();
            }
            Ok(stalled)
        },
        |rank| Ok(out.handle(rank)),
    )
    .unwrap_err();
    assert_eq!(err.worker, 1);
    assert!(matches!(
        err.kind,
        RunErrorKind::NotReadyTimeout { attempts: 4 }
    ));
    assert!(out.frames().unwrap().is_empty());
}
