//! Grid shapes and start/count selections.

use ndarray::{ArrayD, ArrayViewD, Slice};
use smallvec::SmallVec;

use crate::error::CoreError;

/// Extent of a grid along each axis, slowest-varying axis first.
pub type Shape = SmallVec<[usize; 4]>;

/// Shape of an array as a [`Shape`].
pub fn shape_of<T>(array: &ArrayD<T>) -> Shape {
    array.shape().iter().copied().collect()
}

/// Check that a `start`/`count` selection lies inside `shape`.
///
/// Both slices must have one entry per axis. Zero-extent selections are
/// valid as long as `start` does not exceed the axis length.
pub fn check_selection(
    variable: &str,
    shape: &[usize],
    start: &[usize],
    count: &[usize],
) -> Result<(), CoreError> {
    if start.len() != shape.len() || count.len() != shape.len() {
        return Err(CoreError::InvalidSelection {
            variable: variable.to_string(),
            reason: format!(
                "selection has {}/{} axes, variable has {}",
                start.len(),
                count.len(),
                shape.len()
            ),
        });
    }
    for (axis, ((&s, &c), &n)) in start.iter().zip(count).zip(shape).enumerate() {
        let end = s.checked_add(c).ok_or_else(|| CoreError::InvalidSelection {
            variable: variable.to_string(),
            reason: format!("axis {axis}: start {s} + count {c} overflows"),
        })?;
        if end > n {
            return Err(CoreError::InvalidSelection {
                variable: variable.to_string(),
                reason: format!("axis {axis}: [{s}, {end}) exceeds extent {n}"),
            });
        }
    }
    Ok(())
}

/// Borrow the `start`/`count` sub-block of `array`.
///
/// The selection must already have been validated with [`check_selection`].
pub fn select<'a>(
    array: &'a ArrayD<f64>,
    start: &[usize],
    count: &[usize],
) -> ArrayViewD<'a, f64> {
    array.slice_each_axis(|ad| {
        let axis = ad.axis.index();
        let lo = start[axis] as isize;
        Slice::from(lo..lo + count[axis] as isize)
    })
}
