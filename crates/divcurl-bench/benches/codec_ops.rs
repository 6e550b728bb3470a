//! Criterion micro-benchmarks for the step-stream codec.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use divcurl_bench::reference_profile;
use divcurl_stream::codec::{decode_frame, encode_frame};

/// Benchmark: encode one 256x256 two-component frame.
fn bench_codec_encode_frame(c: &mut Criterion) {
    let frame = reference_profile().frames(1).remove(0);

    c.bench_function("codec_encode_frame_256x256", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(1 << 20);
            encode_frame(&mut buf, &frame).unwrap();
            black_box(&buf);
        });
    });
}

/// Benchmark: decode the same frame.
fn bench_codec_decode_frame(c: &mut Criterion) {
    let frame = reference_profile().frames(1).remove(0);

    // Pre-encode the frame into a buffer.
    let mut encoded = Vec::with_capacity(1 << 20);
    encode_frame(&mut encoded, &frame).unwrap();

    c.bench_function("codec_decode_frame_256x256", |b| {
        b.iter(|| {
            let mut cursor = encoded.as_slice();
            let decoded = decode_frame(&mut cursor).unwrap().unwrap();
            black_box(&decoded);
        });
    });
}

/// Benchmark: reassemble a variable written as 8 worker blocks.
fn bench_assemble_blocks(c: &mut Criterion) {
    let frame = reference_profile().frames(1).remove(0);
    let ux = frame.variable("ux").unwrap().assemble().unwrap();
    let mut record = divcurl_stream::VariableRecord::whole("ux", &ux);
    record.blocks = (0..8)
        .map(|w| {
            let lo = w * 32;
            let view = ux.slice_each_axis(|ax| {
                if ax.axis.index() == 1 {
                    ndarray::Slice::from(lo..lo + 32)
                } else {
                    ndarray::Slice::from(..)
                }
            });
            divcurl_stream::Block::from_view(&[0, lo], view)
        })
        .collect();

    c.bench_function("assemble_8_blocks_256x256", |b| {
        b.iter(|| black_box(record.assemble().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_codec_encode_frame,
    bench_codec_decode_frame,
    bench_assemble_blocks
);
criterion_main!(benches);
