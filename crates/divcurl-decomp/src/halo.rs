//! Halo-extended read windows and the read/trim cycle.
//!
//! A worker owning `[start, start + count)` along the decomposition axis
//! reads `halo` extra samples on each side that borders another worker,
//! never past the global domain edge:
//!
//! ```text
//! read_start = max(0, start - halo)
//! read_end   = min(extent, start + count + halo)
//! ghost_low  = start - read_start
//! ghost_high = read_end - (start + count)
//! ```
//!
//! A window is never narrower than `2 * halo + 1` samples, or the whole
//! axis when it is shorter than that. A worker on a global edge that owns
//! too few samples reads further inward instead, so its edge samples get
//! the same one-sided stencil as an undecomposed run.
//!
//! Ghost samples come from re-reading the overlapping source range, not
//! from exchanging data with the neighbouring worker.

use divcurl_core::{
    check_selection, shape_of, CoreError, DerivedFields, Dimensionality, Shape, StepSource,
    VectorField,
};
use ndarray::{ArrayD, Axis, Slice};

use crate::error::DecompositionError;
use crate::partition::Partition;

/// A partition widened by ghost samples on its interior sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HaloWindow {
    /// First index read along the decomposition axis.
    pub read_start: usize,
    /// Number of samples read along the decomposition axis.
    pub read_count: usize,
    /// Ghost samples before the owned range (0 at the global low edge).
    /// Exceeds `halo` only when the window is widened at the high edge.
    pub ghost_low: usize,
    /// Ghost samples after the owned range (0 at the global high edge).
    /// Exceeds `halo` only when the window is widened at the low edge.
    pub ghost_high: usize,
}

impl HaloWindow {
    /// Widen `partition` by `halo` samples, clipped to `[0, extent)`, then
    /// grow it inward until it spans `min(2 * halo + 1, extent)` samples.
    pub fn around(partition: &Partition, extent: usize, halo: usize) -> Self {
        let target = (2 * halo + 1).min(extent);
        let read_start = partition.start.saturating_sub(halo);
        let read_end = extent.min(partition.end() + halo).max(partition.end());

        // Clipped at the low edge: grow upward first, then downward.
        let short = target.saturating_sub(read_end - read_start);
        let read_end = extent.min(read_end + short);
        let short = target.saturating_sub(read_end - read_start);
        let read_start = read_start.saturating_sub(short);
        Self {
            read_start,
            read_count: read_end - read_start,
            ghost_low: partition.start - read_start,
            ghost_high: read_end - partition.end(),
        }
    }

    /// One past the last index read.
    pub fn read_end(&self) -> usize {
        self.read_start + self.read_count
    }
}

/// Reads one worker's ghosted window of a vector field and trims
/// derived results back to the owned partition.
///
/// Only the decomposition axis is bounded; every other axis spans its
/// full global extent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GhostedFieldAccessor {
    partition: Partition,
    global_shape: Shape,
    window: HaloWindow,
}

impl GhostedFieldAccessor {
    /// Build the accessor for `partition` of a grid of `global_shape`.
    pub fn new(
        partition: Partition,
        global_shape: &[usize],
        halo: usize,
    ) -> Result<Self, DecompositionError> {
        let ndim = global_shape.len();
        if partition.axis >= ndim {
            return Err(DecompositionError::AxisOutOfRange {
                axis: partition.axis,
                ndim,
            });
        }
        let extent = global_shape[partition.axis];
        if partition.end() > extent {
            return Err(DecompositionError::PartitionOutOfBounds {
                end: partition.end(),
                extent,
            });
        }
        Ok(Self {
            window: HaloWindow::around(&partition, extent, halo),
            partition,
            global_shape: global_shape.iter().copied().collect(),
        })
    }

    /// The owned partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The halo-extended window.
    pub fn window(&self) -> &HaloWindow {
        &self.window
    }

    /// Global shape the accessor was built for.
    pub fn global_shape(&self) -> &[usize] {
        &self.global_shape
    }

    /// Whether this worker owns no samples and must skip computation.
    pub fn is_degenerate(&self) -> bool {
        self.partition.is_degenerate()
    }

    /// Start/count of the halo-extended read box.
    pub fn read_selection(&self) -> (Shape, Shape) {
        self.selection(self.window.read_start, self.window.read_count)
    }

    /// Start/count of the owned box, used for output declarations.
    pub fn write_selection(&self) -> (Shape, Shape) {
        self.selection(self.partition.start, self.partition.count)
    }

    fn selection(&self, start: usize, count: usize) -> (Shape, Shape) {
        let mut starts: Shape = std::iter::repeat(0).take(self.global_shape.len()).collect();
        let mut counts = self.global_shape.clone();
        starts[self.partition.axis] = start;
        counts[self.partition.axis] = count;
        (starts, counts)
    }

    /// Select and read the window of one variable.
    pub fn read_component(
        &self,
        source: &mut dyn StepSource,
        name: &str,
    ) -> Result<ArrayD<f64>, CoreError> {
        let (start, count) = self.read_selection();
        check_selection(name, &self.global_shape, &start, &count)?;
        log::debug!(
            "selecting '{name}' start={:?} count={:?}",
            start.as_slice(),
            count.as_slice()
        );
        source.set_selection(name, &start, &count)?;
        let data = source.read(name)?;
        let found = shape_of(&data);
        if found != count {
            return Err(CoreError::ShapeMismatch {
                variable: name.to_string(),
                expected: count,
                found,
            });
        }
        Ok(data)
    }

    /// Read the window of every component `dimensionality` needs.
    ///
    /// `uz` is only read for volumetric fields.
    pub fn read_field(
        &self,
        source: &mut dyn StepSource,
        dimensionality: Dimensionality,
        ux: &str,
        uy: &str,
        uz: Option<&str>,
    ) -> Result<VectorField, CoreError> {
        let x = self.read_component(source, ux)?;
        let y = self.read_component(source, uy)?;
        match (dimensionality, uz) {
            (Dimensionality::Volumetric, Some(name)) => {
                let z = self.read_component(source, name)?;
                Ok(VectorField::volumetric(x, y, z))
            }
            (Dimensionality::Volumetric, None) => Err(CoreError::VariableNotFound {
                name: "uz".to_string(),
            }),
            (Dimensionality::Planar, _) => Ok(VectorField::planar(x, y)),
        }
    }

    /// Slice `[ghost_low, ghost_low + count)` out of a window-shaped array
    /// along the decomposition axis.
    pub fn trim(&self, name: &str, window: ArrayD<f64>) -> Result<ArrayD<f64>, CoreError> {
        let axis = self.partition.axis;
        let found = shape_of(&window);
        if window.ndim() != self.global_shape.len() || found[axis] != self.window.read_count {
            let (_, expected) = self.read_selection();
            return Err(CoreError::ShapeMismatch {
                variable: name.to_string(),
                expected,
                found,
            });
        }
        let lo = self.window.ghost_low as isize;
        let hi = lo + self.partition.count as isize;
        Ok(window.slice_axis(Axis(axis), Slice::from(lo..hi)).to_owned())
    }

    /// Trim all four derived fields.
    pub fn trim_all(&self, fields: DerivedFields) -> Result<DerivedFields, CoreError> {
        fields.try_map(|name, array| self.trim(name, array))
    }
}
