//! Integration test: decomposed runs match the undecomposed operator.
//!
//! Each worker differentiates only its halo-extended window, so the
//! assembled output is identical to applying the operator to the whole
//! grid, including layouts where edge workers own a single sample.

use divcurl_core::{DerivedFields, VectorField};
use divcurl_engine::{launch, PipelineConfig};
use divcurl_stencil::{DifferentialOperator, GridSpacing, StencilOrder};
use divcurl_stream::{MemorySink, MemoryStepSource, StepFrame};
use divcurl_test_utils::{
    assert_all_close, derived_from_frame, grid_from_fn, random_grid, vector_frames,
};
use proptest::prelude::*;

const TOL: f64 = 1e-12;

// ── Helpers ──────────────────────────────────────────────────────

fn run(
    frames: &[StepFrame],
    workers: usize,
    order: StencilOrder,
    spacing: GridSpacing,
) -> Vec<StepFrame> {
    let mut cfg = PipelineConfig::with_max_steps(100);
    cfg.workers = workers;
    cfg.stencil_order = order;
    cfg.spacing = spacing;
    let out = MemorySink::in_memory(workers);
    let report = launch(
        &cfg,
        |_| Ok(MemoryStepSource::from_frames(frames.iter().cloned())),
        |rank| Ok(out.handle(rank)),
    )
    .unwrap();
    assert_eq!(report.workers.len(), workers);
    assert_eq!(report.steps_processed(), frames.len() as u64);
    out.frames().unwrap()
}

fn random_frames(shape: &[usize], steps: u64, volumetric: bool, seed: u64) -> Vec<StepFrame> {
    vector_frames(steps, |step| {
        let s = seed.wrapping_mul(31).wrapping_add(step * 3);
        (
            random_grid(shape, s),
            random_grid(shape, s.wrapping_add(1)),
            volumetric.then(|| random_grid(shape, s.wrapping_add(2))),
        )
    })
}

fn reference(frame: &StepFrame, order: StencilOrder, spacing: GridSpacing) -> DerivedFields {
    let get = |name: &str| frame.variable(name).map(|v| v.assemble().unwrap());
    let field = VectorField {
        ux: get("ux").unwrap(),
        uy: get("uy").unwrap(),
        uz: get("uz"),
    };
    DifferentialOperator::builder()
        .order(order)
        .spacing(spacing)
        .build()
        .unwrap()
        .apply(&field)
        .unwrap()
}

fn assert_matches_reference(
    input: &[StepFrame],
    output: &[StepFrame],
    order: StencilOrder,
    spacing: GridSpacing,
) {
    assert_eq!(input.len(), output.len());
    for (inp, out) in input.iter().zip(output) {
        let expected = reference(inp, order, spacing);
        let got = derived_from_frame(out);
        for ((name, e), (_, g)) in expected.iter().zip(got.iter()) {
            assert_all_close(g, e, TOL, &format!("step {} {name}", out.step));
        }
    }
}

// ── Fixed cases ──────────────────────────────────────────────────

#[test]
fn planar_four_workers_all_orders() {
    let frames = random_frames(&[1, 9, 40], 3, false, 7);
    for order in [StencilOrder::Second, StencilOrder::Fourth, StencilOrder::Sixth] {
        let spacing = GridSpacing::default();
        let single = run(&frames, 1, order, spacing);
        let split = run(&frames, 4, order, spacing);
        assert_matches_reference(&frames, &single, order, spacing);
        assert_matches_reference(&frames, &split, order, spacing);
    }
}

#[test]
fn two_axis_input_with_uneven_partitions() {
    let frames = random_frames(&[6, 23], 2, false, 11);
    let spacing = GridSpacing {
        dx: 0.25,
        dy: 2.0,
        dz: 1.0,
    };
    let split = run(&frames, 3, StencilOrder::Fourth, spacing);
    assert_matches_reference(&frames, &split, StencilOrder::Fourth, spacing);
}

#[test]
fn volumetric_four_workers() {
    let frames = random_frames(&[5, 6, 32], 2, true, 3);
    let spacing = GridSpacing::uniform(0.5);
    for order in [StencilOrder::Second, StencilOrder::Sixth] {
        let split = run(&frames, 4, order, spacing);
        assert_matches_reference(&frames, &split, order, spacing);
        let curl_x = derived_from_frame(&split[0]).curl_x;
        assert!(curl_x.iter().any(|v| v.abs() > 1e-6), "volumetric curl_x populated");
    }
}

#[test]
fn every_worker_writes_its_own_block() {
    let frames = random_frames(&[1, 4, 12], 1, false, 5);
    let out = run(&frames, 3, StencilOrder::Second, GridSpacing::default());
    let div = out[0].variable("Div").unwrap();
    let mut starts: Vec<_> = div.blocks.iter().map(|b| b.start[2]).collect();
    starts.sort_unstable();
    assert_eq!(starts, [0, 4, 8]);
    assert!(div.blocks.iter().all(|b| b.count.as_slice() == [1, 4, 4]));
}

#[test]
fn single_sample_edge_partitions_keep_edge_stencil() {
    for (extent, workers) in [(4, 4), (5, 4), (3, 5)] {
        let shape = [1, 4, extent];
        let frames = vector_frames(1, |_| {
            (
                grid_from_fn(&shape, |ix| (ix[2] * ix[2]) as f64),
                grid_from_fn(&shape, |_| 0.0),
                None,
            )
        });
        let out = run(&frames, workers, StencilOrder::Second, GridSpacing::default());
        assert_matches_reference(&frames, &out, StencilOrder::Second, GridSpacing::default());

        // d(x^2)/dx = 2x, exact at the edges with the one-sided stencil.
        let div = derived_from_frame(&out[0]).div;
        for x in 0..extent {
            let got = div[[0, 0, x]];
            assert!(
                (got - 2.0 * x as f64).abs() < TOL,
                "extent {extent}, {workers} workers: div[{x}] = {got}"
            );
        }
    }
}

#[test]
fn higher_orders_on_narrow_partitions() {
    let frames = random_frames(&[1, 3, 9], 1, false, 19);
    for order in [StencilOrder::Fourth, StencilOrder::Sixth] {
        for workers in [4, 6, 9] {
            let out = run(&frames, workers, order, GridSpacing::default());
            assert_matches_reference(&frames, &out, order, GridSpacing::default());
        }
    }
}

// ── Property: any worker count ───────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn decomposed_matches_reference(
        workers in 1usize..=6,
        order_ix in 0usize..3,
        extent in 1usize..24,
        rows in 2usize..6,
        seed in any::<u64>(),
    ) {
        let order = [StencilOrder::Second, StencilOrder::Fourth, StencilOrder::Sixth][order_ix];
        let frames = random_frames(&[1, rows, extent], 1, false, seed);
        let out = run(&frames, workers, order, GridSpacing::default());
        assert_matches_reference(&frames, &out, order, GridSpacing::default());
    }
}
