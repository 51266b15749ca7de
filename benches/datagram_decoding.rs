//! Benchmarks for the per-datagram decode path
//!
//! Covers frame detection, table-driven decoding and the full
//! decode-and-publish pipeline with a live subscriber.
//!
//! Platform: Cross-platform (synthetic frames, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use flightdeck::hub::SampleEmitter;
use flightdeck::mavlink::{decode_datagram, detect};
use flightdeck::test_utils::{encode_v1, encode_v2, rc_channels_payload, sys_status_payload};
use std::hint::black_box;

fn attitude_frame() -> Vec<u8> {
    let mut payload = vec![0u8; 28];
    for (i, value) in [0.1f32, -0.2, 1.5, 0.01, 0.02, 0.03].iter().enumerate() {
        let offset = 4 + i * 4;
        payload[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
    encode_v1(30, &payload)
}

fn bench_detection(c: &mut Criterion) {
    let v1 = attitude_frame();
    let v2 = encode_v2(1, &sys_status_payload(12_600, 250, 75));

    let mut group = c.benchmark_group("frame_detection");
    group.bench_function("v1", |b| b.iter(|| black_box(detect(black_box(&v1)))));
    group.bench_function("v2", |b| b.iter(|| black_box(detect(black_box(&v2)))));
    group.bench_function("unrecognized", |b| b.iter(|| black_box(detect(black_box(&[0x42u8, 1, 2])))));
    group.finish();
}

fn bench_decoding(c: &mut Criterion) {
    let frames = [
        ("attitude_v1", attitude_frame()),
        ("sys_status_v2", encode_v2(1, &sys_status_payload(12_600, 250, 75))),
        ("rc_channels_v1", encode_v1(35, &rc_channels_payload([1100, 1200, 1300, 1400, 1500, 1600, 1700, 1800]))),
    ];

    let mut group = c.benchmark_group("decode_datagram");
    for (name, frame) in &frames {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_function(*name, |b| b.iter(|| black_box(decode_datagram(black_box(frame)))));
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let emitter = SampleEmitter::new(4096);
    let mut receiver = emitter.subscribe();
    let frame = attitude_frame();

    c.bench_function("ingest_with_subscriber", |b| {
        b.iter(|| {
            let emitted = emitter.ingest(black_box(&frame), 0);
            while receiver.try_recv().is_ok() {}
            black_box(emitted)
        })
    });
}

criterion_group!(benches, bench_detection, bench_decoding, bench_pipeline);
criterion_main!(benches);
