//! Binary encode/decode for the step-stream format.
//!
//! All integers are little-endian. Strings are length-prefixed with a `u32`
//! length; shapes are a `u8` rank followed by one `u64` per axis.
//!
//! ```text
//! frame    := step:u64 var_count:u32 variable*
//! variable := name:str global_shape block_count:u32 block*
//! block    := start:shape count:shape f64 * product(count)
//! ```

use std::io::{ErrorKind, Read, Write};

use divcurl_core::{Shape, StreamError};

use crate::types::{check_addressable, check_block, Block, StepFrame, VariableRecord};
use crate::{FORMAT_VERSION, MAGIC};

/// Highest rank a shape may declare.
pub const MAX_RANK: usize = 8;

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), StreamError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), StreamError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), StreamError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a run of little-endian f64 samples.
pub fn write_f64_slice_le(w: &mut dyn Write, values: &[f64]) -> Result<(), StreamError> {
    let mut buf = Vec::with_capacity(values.len() * 8);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    w.write_all(&buf)?;
    Ok(())
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), StreamError> {
    let len = u32::try_from(s.len()).map_err(|_| StreamError::MalformedFrame {
        detail: format!("string of {} bytes is too long", s.len()),
    })?;
    write_u32_le(w, len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Write a shape (u8 rank + u64 per axis).
pub fn write_shape(w: &mut dyn Write, shape: &[usize]) -> Result<(), StreamError> {
    if shape.len() > MAX_RANK {
        return Err(StreamError::MalformedFrame {
            detail: format!("rank {} exceeds maximum {MAX_RANK}", shape.len()),
        });
    }
    write_u8(w, shape.len() as u8)?;
    for &extent in shape {
        write_u64_le(w, extent as u64)?;
    }
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, StreamError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, StreamError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, StreamError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read `n` little-endian f64 samples.
pub fn read_f64_vec_le(r: &mut dyn Read, n: usize) -> Result<Vec<f64>, StreamError> {
    let bytes = n.checked_mul(8).ok_or_else(|| StreamError::MalformedFrame {
        detail: format!("payload of {n} samples overflows"),
    })?;
    let mut buf = Vec::new();
    r.take(bytes as u64).read_to_end(&mut buf)?;
    if buf.len() != bytes {
        return Err(StreamError::MalformedFrame {
            detail: format!("truncated payload: got {} of {bytes} bytes", buf.len()),
        });
    }
    Ok(buf
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect())
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, StreamError> {
    let len = read_u32_le(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| StreamError::MalformedFrame {
        detail: format!("invalid UTF-8 string: {e}"),
    })
}

/// Read a shape.
pub fn read_shape(r: &mut dyn Read) -> Result<Shape, StreamError> {
    let rank = read_u8(r)? as usize;
    if rank > MAX_RANK {
        return Err(StreamError::MalformedFrame {
            detail: format!("rank {rank} exceeds maximum {MAX_RANK}"),
        });
    }
    let mut shape = Shape::with_capacity(rank);
    for _ in 0..rank {
        let extent = read_u64_le(r)?;
        let extent = usize::try_from(extent).map_err(|_| StreamError::MalformedFrame {
            detail: format!("extent {extent} does not fit in memory"),
        })?;
        shape.push(extent);
    }
    Ok(shape)
}

// ── Header encode/decode ────────────────────────────────────────

/// Encode the file header (magic and version).
pub fn encode_header(w: &mut dyn Write) -> Result<(), StreamError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    Ok(())
}

/// Decode and validate the file header.
pub fn decode_header(r: &mut dyn Read) -> Result<(), StreamError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(StreamError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(StreamError::UnsupportedVersion { found: version });
    }
    Ok(())
}

// ── Frame encode/decode ─────────────────────────────────────────

/// Encode a single step frame.
pub fn encode_frame(w: &mut dyn Write, frame: &StepFrame) -> Result<(), StreamError> {
    write_u64_le(w, frame.step)?;
    write_u32_le(w, frame.variables.len() as u32)?;
    for var in &frame.variables {
        write_length_prefixed_str(w, &var.name)?;
        write_shape(w, &var.global_shape)?;
        write_u32_le(w, var.blocks.len() as u32)?;
        for block in &var.blocks {
            check_block(&var.name, &var.global_shape, block)?;
            write_shape(w, &block.start)?;
            write_shape(w, &block.count)?;
            write_f64_slice_le(w, &block.data)?;
        }
    }
    Ok(())
}

/// Decode a single step frame.
///
/// Returns `Ok(None)` on clean EOF (no bytes available), `Ok(Some(frame))`
/// on success, or an error on truncated/corrupt data.
pub fn decode_frame(r: &mut dyn Read) -> Result<Option<StepFrame>, StreamError> {
    // Read the step header byte-by-byte to tell clean EOF from truncation.
    let mut step_buf = [0u8; 8];
    let mut filled = 0;
    while filled < 8 {
        match r.read(&mut step_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(StreamError::MalformedFrame {
                    detail: format!("truncated frame header: got {filled} of 8 bytes for step"),
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StreamError::Io(e)),
        }
    }
    let step = u64::from_le_bytes(step_buf);

    let var_count = read_u32_le(r).map_err(truncated)?;
    let mut variables = Vec::new();
    for _ in 0..var_count {
        let name = read_length_prefixed_str(r).map_err(truncated)?;
        let global_shape = read_shape(r).map_err(truncated)?;
        check_addressable(&name, &global_shape)?;
        let block_count = read_u32_le(r).map_err(truncated)?;
        let mut blocks = Vec::new();
        for _ in 0..block_count {
            let start = read_shape(r).map_err(truncated)?;
            let count = read_shape(r).map_err(truncated)?;
            let len = count
                .iter()
                .try_fold(1usize, |acc, &c| acc.checked_mul(c))
                .ok_or_else(|| StreamError::MalformedFrame {
                    detail: format!("block of '{name}' has an overflowing sample count"),
                })?;
            let data = read_f64_vec_le(r, len).map_err(truncated)?;
            let block = Block { start, count, data };
            check_block(&name, &global_shape, &block)?;
            blocks.push(block);
        }
        variables.push(VariableRecord {
            name,
            global_shape,
            blocks,
        });
    }
    Ok(Some(StepFrame { step, variables }))
}

/// EOF inside a frame is corruption, not an I/O failure.
fn truncated(e: StreamError) -> StreamError {
    match e {
        StreamError::Io(io) if io.kind() == ErrorKind::UnexpectedEof => {
            StreamError::MalformedFrame {
                detail: "frame truncated".to_string(),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn sample_frame() -> StepFrame {
        let a = ArrayD::from_shape_fn(IxDyn(&[1, 3, 4]), |ix| (ix[1] * 4 + ix[2]) as f64 * 0.5);
        StepFrame::new(7).with_variable("ux", &a).with_variable("uy", &(-a.clone()))
    }

    #[test]
    fn header_round_trip() {
        let mut buf = Vec::new();
        encode_header(&mut buf).unwrap();
        assert_eq!(&buf[..4], b"DVCL");
        decode_header(&mut buf.as_slice()).unwrap();
    }

    #[test]
    fn bad_magic_rejected() {
        let buf = b"BP4\0\x01".to_vec();
        assert!(matches!(
            decode_header(&mut buf.as_slice()),
            Err(StreamError::InvalidMagic)
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut buf = MAGIC.to_vec();
        buf.push(FORMAT_VERSION + 1);
        match decode_header(&mut buf.as_slice()) {
            Err(StreamError::UnsupportedVersion { found }) => assert_eq!(found, FORMAT_VERSION + 1),
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn frame_round_trip() {
        let frame = sample_frame();
        let mut buf = Vec::new();
        encode_frame(&mut buf, &frame).unwrap();
        let mut r = buf.as_slice();
        assert_eq!(decode_frame(&mut r).unwrap(), Some(frame));
        assert_eq!(decode_frame(&mut r).unwrap(), None);
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let mut buf = Vec::new();
        encode_frame(&mut buf, &sample_frame()).unwrap();
        for cut in [3, 8, 20, buf.len() - 1] {
            let mut r = &buf[..cut];
            match decode_frame(&mut r) {
                Err(StreamError::MalformedFrame { .. }) => {}
                other => panic!("cut at {cut}: expected MalformedFrame, got {other:?}"),
            }
        }
    }

    #[test]
    fn block_outside_global_shape_rejected_on_encode() {
        let mut frame = sample_frame();
        frame.variables[0].blocks[0].start[2] = 1;
        let mut buf = Vec::new();
        assert!(matches!(
            encode_frame(&mut buf, &frame),
            Err(StreamError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn unaddressable_global_shape_rejected_on_decode() {
        let frame = StepFrame {
            step: 0,
            variables: vec![VariableRecord {
                name: "ux".into(),
                global_shape: Shape::from_slice(&[1 << 40, 1 << 40]),
                blocks: Vec::new(),
            }],
        };
        let mut buf = Vec::new();
        encode_frame(&mut buf, &frame).unwrap();
        match decode_frame(&mut buf.as_slice()) {
            Err(StreamError::MalformedFrame { detail }) => assert!(detail.contains("ux")),
            other => panic!("expected MalformedFrame, got {other:?}"),
        }
    }

    #[test]
    fn oversized_rank_rejected() {
        let mut buf = Vec::new();
        write_u8(&mut buf, (MAX_RANK + 1) as u8).unwrap();
        assert!(read_shape(&mut buf.as_slice()).is_err());
    }
}
