//! Stencil accuracy order and physical grid spacing.

use std::fmt;

/// Accuracy order of the finite-difference stencils.
///
/// Interior samples use central differences of this order; the outermost
/// `halo()` samples of each lane use one-sided stencils of the same order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StencilOrder {
    /// 3-point stencils (the default).
    #[default]
    Second,
    /// 5-point stencils.
    Fourth,
    /// 7-point stencils.
    Sixth,
}

impl StencilOrder {
    /// Parse a numeric order (2, 4 or 6).
    pub fn from_order(order: u32) -> Option<Self> {
        match order {
            2 => Some(Self::Second),
            4 => Some(Self::Fourth),
            6 => Some(Self::Sixth),
            _ => None,
        }
    }

    /// The numeric order.
    pub fn order(self) -> u32 {
        match self {
            Self::Second => 2,
            Self::Fourth => 4,
            Self::Sixth => 6,
        }
    }

    /// Ghost samples a worker needs on each interior side.
    pub fn halo(self) -> usize {
        self.order() as usize / 2
    }

    /// Shortest lane this order can be applied to.
    pub fn min_samples(self) -> usize {
        2 * self.halo() + 1
    }

    /// The next lower order, if any.
    pub fn lower(self) -> Option<Self> {
        match self {
            Self::Second => None,
            Self::Fourth => Some(Self::Second),
            Self::Sixth => Some(Self::Fourth),
        }
    }

    /// Highest order not above `self` that fits a lane of `len` samples.
    ///
    /// `None` when even second order does not fit (fewer than 3 samples).
    pub fn fit(self, len: usize) -> Option<Self> {
        let mut order = self;
        loop {
            if len >= order.min_samples() {
                return Some(order);
            }
            order = order.lower()?;
        }
    }
}

impl fmt::Display for StencilOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.order())
    }
}

/// Uniform sample spacing along x (last axis), y and z (axis 0).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSpacing {
    /// Spacing along x.
    pub dx: f64,
    /// Spacing along y.
    pub dy: f64,
    /// Spacing along z.
    pub dz: f64,
}

impl GridSpacing {
    /// The same spacing along every axis.
    pub fn uniform(h: f64) -> Self {
        Self { dx: h, dy: h, dz: h }
    }

    /// Check that every spacing is finite and positive.
    pub fn validate(&self) -> Result<(), String> {
        for (axis, h) in [("dx", self.dx), ("dy", self.dy), ("dz", self.dz)] {
            if !h.is_finite() || h <= 0.0 {
                return Err(format!("{axis} must be finite and positive, got {h}"));
            }
        }
        Ok(())
    }
}

impl Default for GridSpacing {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halo_is_half_the_order() {
        assert_eq!(StencilOrder::Second.halo(), 1);
        assert_eq!(StencilOrder::Fourth.halo(), 2);
        assert_eq!(StencilOrder::Sixth.halo(), 3);
    }

    #[test]
    fn numeric_round_trip() {
        for n in [2, 4, 6] {
            assert_eq!(StencilOrder::from_order(n).unwrap().order(), n);
        }
        assert_eq!(StencilOrder::from_order(3), None);
        assert_eq!(StencilOrder::from_order(8), None);
    }

    #[test]
    fn fit_falls_back_on_short_lanes() {
        assert_eq!(StencilOrder::Sixth.fit(7), Some(StencilOrder::Sixth));
        assert_eq!(StencilOrder::Sixth.fit(6), Some(StencilOrder::Fourth));
        assert_eq!(StencilOrder::Sixth.fit(4), Some(StencilOrder::Second));
        assert_eq!(StencilOrder::Fourth.fit(100), Some(StencilOrder::Fourth));
        assert_eq!(StencilOrder::Second.fit(2), None);
    }

    #[test]
    fn spacing_must_be_positive() {
        assert!(GridSpacing::default().validate().is_ok());
        let bad = GridSpacing { dx: 1.0, dy: 0.0, dz: 1.0 };
        assert!(bad.validate().unwrap_err().contains("dy"));
        let nan = GridSpacing { dx: f64::NAN, dy: 1.0, dz: 1.0 };
        assert!(nan.validate().unwrap_err().contains("dx"));
    }
}
