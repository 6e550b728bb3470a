//! Capability traits for a step-oriented I/O backend.
//!
//! The pipeline never talks to a storage format directly. A worker owns
//! one [`StepSource`] (its view of the input stream) and one [`StepSink`]
//! (its handle on the shared output stream); implementations live in
//! `divcurl-stream`.

use ndarray::{ArrayD, ArrayViewD};

use crate::error::CoreError;
use crate::id::StepIndex;
use crate::shape::Shape;

/// Outcome of [`StepSource::begin_step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// A step is open and its variables may be read.
    Ok,
    /// The producer has not published the next step yet; try again.
    NotReady,
    /// The stream has no more steps.
    EndOfStream,
}

/// Sequential, step-at-a-time read access to a stream of variables.
///
/// Calls other than `begin_step` are only valid while a step is open
/// (after `begin_step` returned [`StepStatus::Ok`] and before `end_step`).
pub trait StepSource {
    /// Try to open the next step.
    fn begin_step(&mut self) -> Result<StepStatus, CoreError>;

    /// Index of the currently open (or last opened) step.
    fn current_step(&self) -> StepIndex;

    /// Global shape of a variable in the open step.
    fn inquire_shape(&self, name: &str) -> Result<Shape, CoreError>;

    /// Restrict subsequent reads of `name` to a start/count box.
    fn set_selection(&mut self, name: &str, start: &[usize], count: &[usize])
        -> Result<(), CoreError>;

    /// Read a variable, honouring the last selection set for it.
    ///
    /// Without a selection the whole global array is returned.
    fn read(&mut self, name: &str) -> Result<ArrayD<f64>, CoreError>;

    /// Close the open step.
    fn end_step(&mut self) -> Result<(), CoreError>;
}

/// Step-at-a-time write access to one worker's share of an output stream.
pub trait StepSink {
    /// Open a new output step.
    fn begin_step(&mut self) -> Result<(), CoreError>;

    /// Declare a variable's global shape and this worker's block in it.
    fn define_variable(
        &mut self,
        name: &str,
        global_shape: &[usize],
        start: &[usize],
        count: &[usize],
    ) -> Result<(), CoreError>;

    /// Write this worker's block of a defined variable for the open step.
    fn write(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> Result<(), CoreError>;

    /// Close the open step.
    fn end_step(&mut self) -> Result<(), CoreError>;

    /// Flush and release the stream. Further calls fail.
    fn close(&mut self) -> Result<(), CoreError>;
}

impl<T: StepSource + ?Sized> StepSource for Box<T> {
    fn begin_step(&mut self) -> Result<StepStatus, CoreError> {
        (**self).begin_step()
    }

    fn current_step(&self) -> StepIndex {
        (**self).current_step()
    }

    fn inquire_shape(&self, name: &str) -> Result<Shape, CoreError> {
        (**self).inquire_shape(name)
    }

    fn set_selection(
        &mut self,
        name: &str,
        start: &[usize],
        count: &[usize],
    ) -> Result<(), CoreError> {
        (**self).set_selection(name, start, count)
    }

    fn read(&mut self, name: &str) -> Result<ArrayD<f64>, CoreError> {
        (**self).read(name)
    }

    fn end_step(&mut self) -> Result<(), CoreError> {
        (**self).end_step()
    }
}

impl<T: StepSink + ?Sized> StepSink for Box<T> {
    fn begin_step(&mut self) -> Result<(), CoreError> {
        (**self).begin_step()
    }

    fn define_variable(
        &mut self,
        name: &str,
        global_shape: &[usize],
        start: &[usize],
        count: &[usize],
    ) -> Result<(), CoreError> {
        (**self).define_variable(name, global_shape, start, count)
    }

    fn write(&mut self, name: &str, data: ArrayViewD<'_, f64>) -> Result<(), CoreError> {
        (**self).write(name, data)
    }

    fn end_step(&mut self) -> Result<(), CoreError> {
        (**self).end_step()
    }

    fn close(&mut self) -> Result<(), CoreError> {
        (**self).close()
    }
}
