//! In-memory representation of step-stream frames.

use divcurl_core::{shape_of, Shape, StreamError};
use ndarray::{ArrayD, ArrayViewD, IxDyn, Slice};

/// One writer's rectangular piece of a variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// Offset of the block in the global array, per axis.
    pub start: Shape,
    /// Extent of the block, per axis.
    pub count: Shape,
    /// Row-major samples, `count.iter().product()` of them.
    pub data: Vec<f64>,
}

impl Block {
    /// Copy `data` into a block placed at `start`.
    pub fn from_view(start: &[usize], data: ArrayViewD<'_, f64>) -> Self {
        Self {
            start: start.iter().copied().collect(),
            count: data.shape().iter().copied().collect(),
            data: data.iter().copied().collect(),
        }
    }

    /// Number of samples the block covers.
    pub fn len(&self) -> usize {
        self.count.iter().product()
    }

    /// Whether the block covers no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A variable within one step: its global shape and the blocks written.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableRecord {
    /// Variable name.
    pub name: String,
    /// Shape of the full global array.
    pub global_shape: Shape,
    /// Blocks in the order they were written.
    pub blocks: Vec<Block>,
}

impl VariableRecord {
    /// A record holding `array` as a single block covering the whole domain.
    pub fn whole(name: impl Into<String>, array: &ArrayD<f64>) -> Self {
        let origin = vec![0; array.ndim()];
        Self {
            name: name.into(),
            global_shape: shape_of(array),
            blocks: vec![Block::from_view(&origin, array.view())],
        }
    }

    /// Assemble the blocks into the global array.
    ///
    /// Samples no block covers are zero.
    pub fn assemble(&self) -> Result<ArrayD<f64>, StreamError> {
        let origin = vec![0; self.global_shape.len()];
        self.assemble_selection(&origin, &self.global_shape)
    }

    /// Assemble only the `start`/`count` box.
    ///
    /// Allocates a `count`-shaped array and copies in the parts of the
    /// blocks that overlap it. Samples no block covers are zero.
    pub fn assemble_selection(
        &self,
        start: &[usize],
        count: &[usize],
    ) -> Result<ArrayD<f64>, StreamError> {
        check_addressable(&self.name, &self.global_shape)?;
        let ndim = self.global_shape.len();
        let inside = start.len() == ndim
            && count.len() == ndim
            && (0..ndim).all(|axis| {
                start[axis]
                    .checked_add(count[axis])
                    .is_some_and(|end| end <= self.global_shape[axis])
            });
        if !inside {
            return Err(StreamError::MalformedFrame {
                detail: format!(
                    "selection start={start:?} count={count:?} of '{}' is outside {:?}",
                    self.name,
                    self.global_shape.as_slice()
                ),
            });
        }

        let mut out = ArrayD::zeros(IxDyn(count));
        for block in &self.blocks {
            check_block(&self.name, &self.global_shape, block)?;
            let Some(overlap) = overlap(block, start, count) else {
                continue;
            };
            let piece = ArrayViewD::from_shape(IxDyn(&block.count), block.data.as_slice())
                .map_err(|e| StreamError::MalformedFrame {
                    detail: format!("block of '{}': {e}", self.name),
                })?;
            let src = piece.slice_each_axis(|ad| {
                let (lo, hi) = overlap[ad.axis.index()];
                let b = block.start[ad.axis.index()];
                Slice::from((lo - b) as isize..(hi - b) as isize)
            });
            let mut dst = out.slice_each_axis_mut(|ad| {
                let (lo, hi) = overlap[ad.axis.index()];
                let s = start[ad.axis.index()];
                Slice::from((lo - s) as isize..(hi - s) as isize)
            });
            dst.assign(&src);
        }
        Ok(out)
    }
}

/// Per-axis `[lo, hi)` intersection of `block` with the selection box,
/// or `None` when they do not overlap.
fn overlap(block: &Block, start: &[usize], count: &[usize]) -> Option<Vec<(usize, usize)>> {
    (0..start.len())
        .map(|axis| {
            let lo = block.start[axis].max(start[axis]);
            let hi = (block.start[axis] + block.count[axis]).min(start[axis] + count[axis]);
            (lo < hi).then_some((lo, hi))
        })
        .collect()
}

/// Reject shapes whose sample buffer could not be addressed.
pub(crate) fn check_addressable(name: &str, shape: &[usize]) -> Result<(), StreamError> {
    let bytes = shape
        .iter()
        .try_fold(std::mem::size_of::<f64>(), |acc, &n| acc.checked_mul(n.max(1)))
        .filter(|&bytes| bytes <= isize::MAX as usize);
    if bytes.is_none() {
        return Err(StreamError::MalformedFrame {
            detail: format!("'{name}' has an unaddressable global shape {shape:?}"),
        });
    }
    Ok(())
}

/// Check that a block lies inside `global_shape` and carries enough data.
pub(crate) fn check_block(
    name: &str,
    global_shape: &[usize],
    block: &Block,
) -> Result<(), StreamError> {
    let ndim = global_shape.len();
    if block.start.len() != ndim || block.count.len() != ndim {
        return Err(StreamError::MalformedFrame {
            detail: format!("block of '{name}' has wrong rank for a {ndim}-axis variable"),
        });
    }
    for axis in 0..ndim {
        let end = block.start[axis].checked_add(block.count[axis]);
        if end.is_none_or(|end| end > global_shape[axis]) {
            return Err(StreamError::MalformedFrame {
                detail: format!(
                    "block of '{name}' exceeds global shape {global_shape:?} on axis {axis}"
                ),
            });
        }
    }
    if block.data.len() != block.len() {
        return Err(StreamError::MalformedFrame {
            detail: format!(
                "block of '{name}' has {} samples, expected {}",
                block.data.len(),
                block.len()
            ),
        });
    }
    Ok(())
}

/// Every variable written during one step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepFrame {
    /// Step index.
    pub step: u64,
    /// Variables in definition order.
    pub variables: Vec<VariableRecord>,
}

impl StepFrame {
    /// An empty frame for `step`.
    pub fn new(step: u64) -> Self {
        Self {
            step,
            variables: Vec::new(),
        }
    }

    /// Append a whole-domain variable (builder style).
    pub fn with_variable(mut self, name: impl Into<String>, array: &ArrayD<f64>) -> Self {
        self.variables.push(VariableRecord::whole(name, array));
        self
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&VariableRecord> {
        self.variables.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use divcurl_core::select;

    fn ramp(shape: &[usize]) -> ArrayD<f64> {
        let mut n = 0.0;
        ArrayD::from_shape_simple_fn(IxDyn(shape), || {
            n += 1.0;
            n
        })
    }

    #[test]
    fn whole_record_assembles_to_itself() {
        let a = ramp(&[2, 3, 4]);
        let rec = VariableRecord::whole("ux", &a);
        assert_eq!(rec.assemble().unwrap(), a);
    }

    #[test]
    fn blocks_are_placed_at_their_start() {
        let a = ramp(&[1, 2, 6]);
        let left = select(&a, &[0, 0, 0], &[1, 2, 4]);
        let right = select(&a, &[0, 0, 4], &[1, 2, 2]);
        let rec = VariableRecord {
            name: "Div".into(),
            global_shape: Shape::from_slice(&[1, 2, 6]),
            blocks: vec![
                Block::from_view(&[0, 0, 4], right),
                Block::from_view(&[0, 0, 0], left),
            ],
        };
        assert_eq!(rec.assemble().unwrap(), a);
    }

    #[test]
    fn uncovered_samples_are_zero() {
        let rec = VariableRecord {
            name: "Div".into(),
            global_shape: Shape::from_slice(&[2, 2]),
            blocks: vec![Block {
                start: Shape::from_slice(&[0, 1]),
                count: Shape::from_slice(&[2, 1]),
                data: vec![5.0, 6.0],
            }],
        };
        let out = rec.assemble().unwrap();
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), [0.0, 5.0, 0.0, 6.0]);
    }

    #[test]
    fn out_of_bounds_block_rejected() {
        let rec = VariableRecord {
            name: "Div".into(),
            global_shape: Shape::from_slice(&[2, 2]),
            blocks: vec![Block {
                start: Shape::from_slice(&[0, 1]),
                count: Shape::from_slice(&[2, 2]),
                data: vec![0.0; 4],
            }],
        };
        match rec.assemble() {
            Err(StreamError::MalformedFrame { detail }) => assert!(detail.contains("axis 1")),
            other => panic!("expected MalformedFrame, got {other:?}"),
        }
    }

    #[test]
    fn selection_copies_only_overlapping_blocks() {
        let a = ramp(&[2, 7]);
        let rec = VariableRecord {
            name: "Div".into(),
            global_shape: Shape::from_slice(&[2, 7]),
            blocks: vec![
                Block::from_view(&[0, 0], select(&a, &[0, 0], &[2, 3])),
                Block::from_view(&[0, 3], select(&a, &[0, 3], &[2, 2])),
                Block::from_view(&[0, 5], select(&a, &[0, 5], &[2, 2])),
            ],
        };
        let part = rec.assemble_selection(&[0, 2], &[2, 4]).unwrap();
        assert_eq!(part, select(&a, &[0, 2], &[2, 4]));
        assert!(rec.assemble_selection(&[0, 5], &[2, 3]).is_err());
    }

    #[test]
    fn selection_of_huge_variable_allocates_only_the_box() {
        let rec = VariableRecord {
            name: "ux".into(),
            global_shape: Shape::from_slice(&[2, 1 << 40]),
            blocks: vec![Block {
                start: Shape::from_slice(&[0, 5]),
                count: Shape::from_slice(&[2, 2]),
                data: vec![1.0, 2.0, 3.0, 4.0],
            }],
        };
        let part = rec.assemble_selection(&[0, 4], &[2, 4]).unwrap();
        assert_eq!(
            part.iter().copied().collect::<Vec<_>>(),
            [0.0, 1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0]
        );
    }

    #[test]
    fn unaddressable_global_shape_rejected() {
        let rec = VariableRecord {
            name: "ux".into(),
            global_shape: Shape::from_slice(&[1 << 40, 1 << 40]),
            blocks: Vec::new(),
        };
        assert!(matches!(
            rec.assemble(),
            Err(StreamError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn frame_lookup_by_name() {
        let frame = StepFrame::new(3)
            .with_variable("ux", &ramp(&[2, 2]))
            .with_variable("uy", &ramp(&[2, 2]));
        assert_eq!(frame.variable("uy").unwrap().name, "uy");
        assert!(frame.variable("uz").is_none());
    }
}
