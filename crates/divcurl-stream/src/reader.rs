//! Step-stream reader.
//!
//! [`StepStreamReader`] decodes frames from any `Read` source. The header
//! is validated on construction.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use divcurl_core::StreamError;

use crate::codec::{decode_frame, decode_header};
use crate::types::StepFrame;

/// Reads step frames from a byte stream.
///
/// Generic over `R: Read` so tests can use `&[u8]` and production
/// code can use `BufReader<File>`.
pub struct StepStreamReader<R: Read> {
    reader: R,
    frames_read: u64,
}

impl StepStreamReader<BufReader<File>> {
    /// Open the step-stream file at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let file = File::open(path)?;
        Self::open(BufReader::new(file))
    }
}

impl<R: Read> StepStreamReader<R> {
    /// Open a stream, reading and validating the header.
    pub fn open(mut reader: R) -> Result<Self, StreamError> {
        decode_header(&mut reader)?;
        Ok(Self {
            reader,
            frames_read: 0,
        })
    }

    /// Read the next frame, or `None` if the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<StepFrame>, StreamError> {
        let frame = decode_frame(&mut self.reader)?;
        if frame.is_some() {
            self.frames_read += 1;
        }
        Ok(frame)
    }

    /// Number of frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Convert into a frame iterator.
    pub fn frames(self) -> FrameIter<R> {
        FrameIter {
            reader: self.reader,
            done: false,
        }
    }
}

/// Iterator adapter over step frames.
pub struct FrameIter<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> Iterator for FrameIter<R> {
    type Item = Result<StepFrame, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match decode_frame(&mut self.reader) {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::StepStreamWriter;
    use ndarray::{ArrayD, IxDyn};

    fn encoded(steps: u64) -> Vec<u8> {
        let ux = ArrayD::from_shape_fn(IxDyn(&[2, 3]), |ix| (ix[0] + ix[1]) as f64);
        let mut w = StepStreamWriter::new(Vec::new()).unwrap();
        for step in 0..steps {
            w.write_frame(&StepFrame::new(step).with_variable("ux", &ux))
                .unwrap();
        }
        w.into_inner()
    }

    #[test]
    fn empty_stream_has_no_frames() {
        let buf = encoded(0);
        let mut r = StepStreamReader::open(buf.as_slice()).unwrap();
        assert!(r.next_frame().unwrap().is_none());
        assert_eq!(r.frames_read(), 0);
    }

    #[test]
    fn iterator_yields_all_frames_in_order() {
        let buf = encoded(4);
        let steps: Vec<u64> = StepStreamReader::open(buf.as_slice())
            .unwrap()
            .frames()
            .map(|f| f.unwrap().step)
            .collect();
        assert_eq!(steps, [0, 1, 2, 3]);
    }

    #[test]
    fn iterator_stops_after_error() {
        let mut buf = encoded(2);
        buf.truncate(buf.len() - 3);
        let results: Vec<_> = StepStreamReader::open(buf.as_slice())
            .unwrap()
            .frames()
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn open_rejects_empty_input() {
        let empty: &[u8] = &[];
        match StepStreamReader::open(empty) {
            Err(StreamError::Io(_)) => {}
            other => panic!("expected Io error, got {:?}", other.map(|_| ())),
        }
    }
}
