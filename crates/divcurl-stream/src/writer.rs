//! Step-stream writer.
//!
//! [`StepStreamWriter`] encodes frames to any `Write` sink. The header is
//! written immediately on construction.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use divcurl_core::StreamError;

use crate::codec::{encode_frame, encode_header};
use crate::types::StepFrame;

/// Writes step frames to a byte stream.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production
/// code can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use divcurl_stream::{StepFrame, StepStreamReader, StepStreamWriter};
/// use ndarray::{ArrayD, IxDyn};
///
/// let ux = ArrayD::<f64>::zeros(IxDyn(&[1, 4, 4]));
/// let mut buf = Vec::new();
/// let mut writer = StepStreamWriter::new(&mut buf).unwrap();
/// for step in 0..2u64 {
///     writer.write_frame(&StepFrame::new(step).with_variable("ux", &ux)).unwrap();
/// }
/// assert_eq!(writer.frames_written(), 2);
/// drop(writer);
///
/// let mut reader = StepStreamReader::open(buf.as_slice()).unwrap();
/// assert_eq!(reader.next_frame().unwrap().unwrap().step, 0);
/// assert_eq!(reader.next_frame().unwrap().unwrap().step, 1);
/// assert!(reader.next_frame().unwrap().is_none());
/// ```
pub struct StepStreamWriter<W: Write> {
    writer: W,
    frames_written: u64,
}

impl StepStreamWriter<BufWriter<File>> {
    /// Create (or truncate) a step-stream file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> StepStreamWriter<W> {
    /// Create a new writer, immediately writing the header.
    pub fn new(mut writer: W) -> Result<Self, StreamError> {
        encode_header(&mut writer)?;
        Ok(Self {
            writer,
            frames_written: 0,
        })
    }

    /// Encode one frame.
    pub fn write_frame(&mut self, frame: &StepFrame) -> Result<(), StreamError> {
        encode_frame(&mut self.writer, frame)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Consume the writer and return the underlying `Write` sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
