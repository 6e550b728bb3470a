//! One-dimensional finite-difference kernels.
//!
//! Every lane (1D line of samples along one axis) is differentiated
//! independently. With `h` the spacing and `n` the lane length:
//!
//! ```text
//! interior  g[i]     =  Σ_k w_k (f[i+k] - f[i-k]) / (d h)      k = 1..=halo
//! low edge  g[k]     =  Σ_j b_kj f[j] / (d h)                  k < halo
//! high edge g[n-1-k] = -Σ_j b_kj f[n-1-j] / (d h)
//! ```
//!
//! Second order matches numpy's `gradient(..., edge_order=2)`. Lanes
//! shorter than the requested order fall back to a lower order; a lane of
//! two samples gets a first-order difference and a single sample gets 0.

use ndarray::{ArrayD, ArrayView1, ArrayViewD, ArrayViewMut1, Axis, Zip};

use crate::order::StencilOrder;

struct Scheme {
    denom: f64,
    interior: &'static [f64],
    boundary: &'static [&'static [f64]],
}

const SECOND: Scheme = Scheme {
    denom: 2.0,
    interior: &[1.0],
    boundary: &[&[-3.0, 4.0, -1.0]],
};

const FOURTH: Scheme = Scheme {
    denom: 12.0,
    interior: &[8.0, -1.0],
    boundary: &[
        &[-25.0, 48.0, -36.0, 16.0, -3.0],
        &[-3.0, -10.0, 18.0, -6.0, 1.0],
    ],
};

const SIXTH: Scheme = Scheme {
    denom: 60.0,
    interior: &[45.0, -9.0, 1.0],
    boundary: &[
        &[-147.0, 360.0, -450.0, 400.0, -225.0, 72.0, -10.0],
        &[-10.0, -77.0, 150.0, -100.0, 50.0, -15.0, 2.0],
        &[2.0, -24.0, -35.0, 80.0, -30.0, 8.0, -1.0],
    ],
};

fn scheme(order: StencilOrder) -> &'static Scheme {
    match order {
        StencilOrder::Second => &SECOND,
        StencilOrder::Fourth => &FOURTH,
        StencilOrder::Sixth => &SIXTH,
    }
}

/// Differentiate one lane `f` into `g` (same length).
pub fn gradient_lane(
    f: ArrayView1<'_, f64>,
    mut g: ArrayViewMut1<'_, f64>,
    spacing: f64,
    order: StencilOrder,
) {
    let n = f.len();
    debug_assert_eq!(n, g.len());
    let Some(order) = order.fit(n) else {
        match n {
            0 => {}
            1 => g[0] = 0.0,
            _ => {
                let d = (f[1] - f[0]) / spacing;
                g[0] = d;
                g[1] = d;
            }
        }
        return;
    };

    let s = scheme(order);
    let scale = 1.0 / (s.denom * spacing);
    let halo = s.interior.len();

    for (k, row) in s.boundary.iter().enumerate() {
        let mut lo = 0.0;
        let mut hi = 0.0;
        for (j, &b) in row.iter().enumerate() {
            lo += b * f[j];
            hi += b * f[n - 1 - j];
        }
        g[k] = lo * scale;
        g[n - 1 - k] = -hi * scale;
    }
    for i in halo..n - halo {
        let mut acc = 0.0;
        for (k, &w) in s.interior.iter().enumerate() {
            acc += w * (f[i + k + 1] - f[i - k - 1]);
        }
        g[i] = acc * scale;
    }
}

/// Partial derivative of `field` along `axis`.
///
/// # Panics
///
/// Panics if `axis` is not an axis of `field`.
pub fn gradient(
    field: &ArrayViewD<'_, f64>,
    axis: usize,
    spacing: f64,
    order: StencilOrder,
) -> ArrayD<f64> {
    let mut out = ArrayD::zeros(field.raw_dim());
    Zip::from(out.lanes_mut(Axis(axis)))
        .and(field.lanes(Axis(axis)))
        .for_each(|g, f| gradient_lane(f, g, spacing, order));
    out
}
