//! Benchmark profiles and utilities for the divcurl pipeline.
//!
//! Provides pre-built [`BenchProfile`]s for benchmarking:
//!
//! - [`reference_profile`]: planar 256x256 grid, fourth order, 4 workers
//! - [`stress_profile`]: volumetric 64x64x64 grid, sixth order, 8 workers
//! - [`swirl_frames`]: deterministic smooth input with seeded noise

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::f64::consts::TAU;

use divcurl_engine::PipelineConfig;
use divcurl_stencil::{GridSpacing, StencilOrder};
use divcurl_stream::StepFrame;
use ndarray::{ArrayD, IxDyn};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A benchmark workload: grid, stencil, worker count and step count.
#[derive(Clone, Debug)]
pub struct BenchProfile {
    /// Global grid shape (2 or 3 axes).
    pub shape: Vec<usize>,
    /// Stencil order.
    pub order: StencilOrder,
    /// Worker count.
    pub workers: usize,
    /// Steps in the generated stream.
    pub steps: u64,
}

impl BenchProfile {
    /// Pipeline configuration processing every generated step.
    pub fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::with_max_steps(self.steps as i64);
        config.workers = self.workers;
        config.stencil_order = self.order;
        config.spacing = GridSpacing::uniform(1.0 / self.shape[self.shape.len() - 1] as f64);
        config
    }

    /// The input stream for this profile.
    pub fn frames(&self, seed: u64) -> Vec<StepFrame> {
        swirl_frames(&self.shape, self.steps, seed)
    }

    /// Number of grid points per step.
    pub fn cell_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Planar 256x256 grid (65K cells), fourth order, 4 workers, 8 steps.
pub fn reference_profile() -> BenchProfile {
    BenchProfile {
        shape: vec![256, 256],
        order: StencilOrder::Fourth,
        workers: 4,
        steps: 8,
    }
}

/// Volumetric 64x64x64 grid (262K cells), sixth order, 8 workers, 4 steps.
pub fn stress_profile() -> BenchProfile {
    BenchProfile {
        shape: vec![64, 64, 64],
        order: StencilOrder::Sixth,
        workers: 8,
        steps: 4,
    }
}

/// A smooth rotating field plus small seeded noise, one frame per step.
///
/// Planar shapes get `ux`/`uy`; volumetric shapes also get `uz`.
pub fn swirl_frames(shape: &[usize], steps: u64, seed: u64) -> Vec<StepFrame> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..steps)
        .map(|step| {
            let phase = step as f64 * 0.1;
            let mut component = |axis_a: usize, axis_b: usize, sign: f64| {
                ArrayD::from_shape_fn(IxDyn(shape), |ix| {
                    let a = unit(ix[axis_a], shape[axis_a]);
                    let b = unit(ix[axis_b], shape[axis_b]);
                    let noise = (rng.next_u32() as f64 / u32::MAX as f64 - 0.5) * 1e-3;
                    sign * (TAU * a + phase).sin() * (TAU * b).cos() + noise
                })
            };
            let n = shape.len();
            let (x, y) = (n - 1, n - 2);
            let ux = component(y, x, 1.0);
            let uy = component(x, y, -1.0);
            let frame = StepFrame::new(step)
                .with_variable("ux", &ux)
                .with_variable("uy", &uy);
            if n == 3 {
                let uz = component(0, x, 0.5);
                frame.with_variable("uz", &uz)
            } else {
                frame
            }
        })
        .collect()
}

fn unit(i: usize, n: usize) -> f64 {
    i as f64 / n.max(1) as f64
}
