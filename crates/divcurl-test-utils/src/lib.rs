//! Test utilities and mock types for divcurl development.
//!
//! Provides analytic and seeded-random grid fixtures, a
//! [`MockStepSource`] that records the selections issued against it, and
//! helpers for building input streams and comparing reassembled output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashMap;

use divcurl_core::{
    check_selection, select, shape_of, CoreError, Shape, StepIndex, StepSource, StepStatus,
};
use ndarray::ArrayD;

pub use fixtures::{
    assert_all_close, derived_from_frame, grid_from_fn, linear_grid, random_grid, vector_frames,
};

/// Mock implementation of [`StepSource`].
///
/// Backed by a `HashMap<String, ArrayD<f64>>` of global arrays that stay
/// the same for every step. Every `set_selection` call is recorded and can
/// be inspected with [`selections`](MockStepSource::selections).
#[derive(Default)]
pub struct MockStepSource {
    variables: HashMap<String, ArrayD<f64>>,
    active: HashMap<String, (Shape, Shape)>,
    selections: Vec<(String, Shape, Shape)>,
    steps_left: Option<u64>,
    step: StepIndex,
    opened: u64,
}

impl MockStepSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a variable with its global array.
    pub fn set_variable(&mut self, name: &str, data: ArrayD<f64>) {
        self.variables.insert(name.to_string(), data);
    }

    /// Report `EndOfStream` after `steps` steps (unbounded by default).
    pub fn limit_steps(&mut self, steps: u64) {
        self.steps_left = Some(steps);
    }

    /// Every selection issued so far as `(name, start, count)`.
    pub fn selections(&self) -> &[(String, Shape, Shape)] {
        &self.selections
    }

    fn global(&self, name: &str) -> Result<&ArrayD<f64>, CoreError> {
        self.variables
            .get(name)
            .ok_or_else(|| CoreError::VariableNotFound {
                name: name.to_string(),
            })
    }
}

impl StepSource for MockStepSource {
    fn begin_step(&mut self) -> Result<StepStatus, CoreError> {
        if let Some(left) = self.steps_left.as_mut() {
            if *left == 0 {
                return Ok(StepStatus::EndOfStream);
            }
            *left -= 1;
        }
        self.step = StepIndex(self.opened);
        self.opened += 1;
        self.active.clear();
        Ok(StepStatus::Ok)
    }

    fn current_step(&self) -> StepIndex {
        self.step
    }

    fn inquire_shape(&self, name: &str) -> Result<Shape, CoreError> {
        Ok(shape_of(self.global(name)?))
    }

    fn set_selection(
        &mut self,
        name: &str,
        start: &[usize],
        count: &[usize],
    ) -> Result<(), CoreError> {
        let shape = self.inquire_shape(name)?;
        check_selection(name, &shape, start, count)?;
        let start: Shape = start.iter().copied().collect();
        let count: Shape = count.iter().copied().collect();
        self.selections
            .push((name.to_string(), start.clone(), count.clone()));
        self.active.insert(name.to_string(), (start, count));
        Ok(())
    }

    fn read(&mut self, name: &str) -> Result<ArrayD<f64>, CoreError> {
        let global = self.global(name)?;
        Ok(match self.active.get(name) {
            Some((start, count)) => select(global, start, count).to_owned(),
            None => global.clone(),
        })
    }

    fn end_step(&mut self) -> Result<(), CoreError> {
        Ok(())
    }
}
