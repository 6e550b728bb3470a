//! Grid fixtures and helpers for building and checking streams.

use divcurl_core::{DerivedFields, DERIVED_NAMES};
use divcurl_stream::StepFrame;
use ndarray::{ArrayD, Dimension, IxDyn};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A grid whose value at each index is `f(index)`.
pub fn grid_from_fn(shape: &[usize], f: impl Fn(&[usize]) -> f64) -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(shape), |ix| f(ix.slice()))
}

/// A grid whose value is `Σ coeffs[a] * index[a]`.
///
/// `coeffs` must have one entry per axis.
pub fn linear_grid(shape: &[usize], coeffs: &[f64]) -> ArrayD<f64> {
    assert_eq!(shape.len(), coeffs.len(), "one coefficient per axis");
    grid_from_fn(shape, |ix| {
        ix.iter().zip(coeffs).map(|(&i, &c)| i as f64 * c).sum()
    })
}

/// A grid of uniform samples in `[-1, 1)` drawn from a seeded ChaCha8 RNG.
pub fn random_grid(shape: &[usize], seed: u64) -> ArrayD<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    ArrayD::from_shape_simple_fn(IxDyn(shape), || {
        let unit = (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        2.0 * unit - 1.0
    })
}

/// One frame per step holding `ux`/`uy` (and `uz` when given).
///
/// `make(step)` returns the components for that step.
pub fn vector_frames(
    steps: u64,
    make: impl Fn(u64) -> (ArrayD<f64>, ArrayD<f64>, Option<ArrayD<f64>>),
) -> Vec<StepFrame> {
    (0..steps)
        .map(|step| {
            let (ux, uy, uz) = make(step);
            let frame = StepFrame::new(step)
                .with_variable("ux", &ux)
                .with_variable("uy", &uy);
            match uz {
                Some(uz) => frame.with_variable("uz", &uz),
                None => frame,
            }
        })
        .collect()
}

/// Reassemble the four derived fields written into `frame`.
///
/// # Panics
///
/// Panics if a derived variable is missing or its blocks are corrupt.
pub fn derived_from_frame(frame: &StepFrame) -> DerivedFields {
    let get = |name: &str| {
        frame
            .variable(name)
            .unwrap_or_else(|| panic!("frame {} has no '{name}'", frame.step))
            .assemble()
            .unwrap_or_else(|e| panic!("frame {} '{name}': {e}", frame.step))
    };
    DerivedFields {
        div: get(DERIVED_NAMES[0]),
        curl_x: get(DERIVED_NAMES[1]),
        curl_y: get(DERIVED_NAMES[2]),
        curl_z: get(DERIVED_NAMES[3]),
    }
}

/// Assert two arrays have the same shape and agree within `tol`.
pub fn assert_all_close(a: &ArrayD<f64>, b: &ArrayD<f64>, tol: f64, what: &str) {
    assert_eq!(a.shape(), b.shape(), "{what}: shapes differ");
    for ((ix, x), y) in a.indexed_iter().zip(b.iter()) {
        assert!(
            (x - y).abs() <= tol,
            "{what} at {ix:?}: {x} vs {y} (tolerance {tol})"
        );
    }
}
