//! [`StepSource`] implementations over step-stream frames.
//!
//! Every worker owns its own source. Variables are assembled from their
//! blocks on read and the last selection set for a name is applied.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use divcurl_core::{
    check_selection, CoreError, Shape, StepIndex, StepSource, StepStatus, StreamError,
};
use indexmap::IndexMap;
use ndarray::ArrayD;

use crate::reader::StepStreamReader;
use crate::types::StepFrame;

/// The frame of the currently open step plus per-variable selections.
#[derive(Debug)]
struct OpenStep {
    frame: Arc<StepFrame>,
    selections: IndexMap<String, (Shape, Shape)>,
}

impl OpenStep {
    fn new(frame: Arc<StepFrame>) -> Self {
        Self {
            frame,
            selections: IndexMap::new(),
        }
    }

    fn inquire_shape(&self, name: &str) -> Result<Shape, CoreError> {
        self.frame
            .variable(name)
            .map(|v| v.global_shape.clone())
            .ok_or_else(|| CoreError::VariableNotFound {
                name: name.to_string(),
            })
    }

    fn set_selection(
        &mut self,
        name: &str,
        start: &[usize],
        count: &[usize],
    ) -> Result<(), CoreError> {
        let shape = self.inquire_shape(name)?;
        check_selection(name, &shape, start, count)?;
        self.selections.insert(
            name.to_string(),
            (start.iter().copied().collect(), count.iter().copied().collect()),
        );
        Ok(())
    }

    fn read(&self, name: &str) -> Result<ArrayD<f64>, CoreError> {
        let var = self
            .frame
            .variable(name)
            .ok_or_else(|| CoreError::VariableNotFound {
                name: name.to_string(),
            })?;
        let data = match self.selections.get(name) {
            Some((start, count)) => var.assemble_selection(start, count)?,
            None => var.assemble()?,
        };
        Ok(data)
    }
}

/// Shared open/close bookkeeping for both source kinds.
#[derive(Debug, Default)]
struct Cursor {
    open: Option<OpenStep>,
    current: StepIndex,
}

impl Cursor {
    fn begin(&mut self, frame: Arc<StepFrame>) {
        self.current = StepIndex(frame.step);
        self.open = Some(OpenStep::new(frame));
    }

    fn ensure_closed(&self) -> Result<(), CoreError> {
        if self.open.is_some() {
            return Err(StreamError::StepInProgress.into());
        }
        Ok(())
    }

    fn step(&self) -> Result<&OpenStep, CoreError> {
        self.open.as_ref().ok_or(CoreError::Stream(StreamError::NoActiveStep))
    }

    fn step_mut(&mut self) -> Result<&mut OpenStep, CoreError> {
        self.open
            .as_mut()
            .ok_or(CoreError::Stream(StreamError::NoActiveStep))
    }

    fn end(&mut self) -> Result<(), CoreError> {
        self.open
            .take()
            .map(|_| ())
            .ok_or(CoreError::Stream(StreamError::NoActiveStep))
    }
}

impl Clone for Cursor {
    fn clone(&self) -> Self {
        // Clones start between steps.
        Self {
            open: None,
            current: self.current,
        }
    }
}

// ── In-memory source ────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Entry {
    Frame(Arc<StepFrame>),
    NotReady,
}

/// A [`StepSource`] over frames held in memory.
///
/// Cloning is cheap (frames are shared), so one scripted stream can be
/// handed to every worker.
///
/// # Examples
///
/// ```
/// use divcurl_core::{StepSource, StepStatus};
/// use divcurl_stream::{MemoryStepSource, StepFrame};
/// use ndarray::{ArrayD, IxDyn};
///
/// let ux = ArrayD::<f64>::zeros(IxDyn(&[1, 4, 8]));
/// let mut source = MemoryStepSource::new()
///     .with_not_ready()
///     .with_frame(StepFrame::new(0).with_variable("ux", &ux));
///
/// assert_eq!(source.begin_step().unwrap(), StepStatus::NotReady);
/// assert_eq!(source.begin_step().unwrap(), StepStatus::Ok);
/// assert_eq!(source.inquire_shape("ux").unwrap().as_slice(), &[1, 4, 8]);
/// source.end_step().unwrap();
/// assert_eq!(source.begin_step().unwrap(), StepStatus::EndOfStream);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryStepSource {
    pending: VecDeque<Entry>,
    cursor: Cursor,
}

impl MemoryStepSource {
    /// An empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// A stream yielding `frames` in order.
    pub fn from_frames(frames: impl IntoIterator<Item = StepFrame>) -> Self {
        let mut source = Self::new();
        for frame in frames {
            source.push_frame(frame);
        }
        source
    }

    /// Append a frame.
    pub fn push_frame(&mut self, frame: StepFrame) {
        self.pending.push_back(Entry::Frame(Arc::new(frame)));
    }

    /// Append a `NotReady` answer to the next `begin_step`.
    pub fn push_not_ready(&mut self) {
        self.pending.push_back(Entry::NotReady);
    }

    /// Append a frame (builder style).
    pub fn with_frame(mut self, frame: StepFrame) -> Self {
        self.push_frame(frame);
        self
    }

    /// Append a `NotReady` answer (builder style).
    pub fn with_not_ready(mut self) -> Self {
        self.push_not_ready();
        self
    }

    /// Entries (frames and `NotReady` answers) not yet consumed.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl StepSource for MemoryStepSource {
    fn begin_step(&mut self) -> Result<StepStatus, CoreError> {
        self.cursor.ensure_closed()?;
        match self.pending.pop_front() {
            Some(Entry::Frame(frame)) => {
                self.cursor.begin(frame);
                Ok(StepStatus::Ok)
            }
            Some(Entry::NotReady) => Ok(StepStatus::NotReady),
            None => Ok(StepStatus::EndOfStream),
        }
    }

    fn current_step(&self) -> StepIndex {
        self.cursor.current
    }

    fn inquire_shape(&self, name: &str) -> Result<Shape, CoreError> {
        self.cursor.step()?.inquire_shape(name)
    }

    fn set_selection(
        &mut self,
        name: &str,
        start: &[usize],
        count: &[usize],
    ) -> Result<(), CoreError> {
        self.cursor.step_mut()?.set_selection(name, start, count)
    }

    fn read(&mut self, name: &str) -> Result<ArrayD<f64>, CoreError> {
        self.cursor.step()?.read(name)
    }

    fn end_step(&mut self) -> Result<(), CoreError> {
        self.cursor.end()
    }
}

// ── File-backed source ──────────────────────────────────────────

/// A [`StepSource`] reading a step-stream file frame by frame.
pub struct FileStepSource<R: Read = BufReader<File>> {
    reader: StepStreamReader<R>,
    cursor: Cursor,
    exhausted: bool,
}

impl FileStepSource<BufReader<File>> {
    /// Open the step-stream file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        log::debug!("opening step stream {}", path.display());
        Ok(Self::from_stream(StepStreamReader::open_path(path)?))
    }
}

impl<R: Read> FileStepSource<R> {
    /// Wrap an already opened stream.
    pub fn from_stream(reader: StepStreamReader<R>) -> Self {
        Self {
            reader,
            cursor: Cursor::default(),
            exhausted: false,
        }
    }

    /// Open a stream from any reader.
    pub fn from_reader(reader: R) -> Result<Self, CoreError> {
        Ok(Self::from_stream(StepStreamReader::open(reader)?))
    }
}

impl<R: Read> StepSource for FileStepSource<R> {
    fn begin_step(&mut self) -> Result<StepStatus, CoreError> {
        self.cursor.ensure_closed()?;
        if self.exhausted {
            return Ok(StepStatus::EndOfStream);
        }
        match self.reader.next_frame()? {
            Some(frame) => {
                self.cursor.begin(Arc::new(frame));
                Ok(StepStatus::Ok)
            }
            None => {
                self.exhausted = true;
                Ok(StepStatus::EndOfStream)
            }
        }
    }

    fn current_step(&self) -> StepIndex {
        self.cursor.current
    }

    fn inquire_shape(&self, name: &str) -> Result<Shape, CoreError> {
        self.cursor.step()?.inquire_shape(name)
    }

    fn set_selection(
        &mut self,
        name: &str,
        start: &[usize],
        count: &[usize],
    ) -> Result<(), CoreError> {
        self.cursor.step_mut()?.set_selection(name, start, count)
    }

    fn read(&mut self, name: &str) -> Result<ArrayD<f64>, CoreError> {
        self.cursor.step()?.read(name)
    }

    fn end_step(&mut self) -> Result<(), CoreError> {
        self.cursor.end()
    }
}
