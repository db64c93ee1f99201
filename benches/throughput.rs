//! Throughput benchmarks

use cipherlink_core::core::event::classify;
use cipherlink_core::core::framing::LineFramer;
use cipherlink_core::core::history::History;
use cipherlink_core::core::replay::replay_bytes;
use cipherlink_core::core::tracker::SessionTracker;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

fn capture(exchanges: usize) -> Vec<u8> {
    let mut data = b"Public key: (7, 187)\r\nPrivate key: (23, 187)\r\n".to_vec();
    for i in 0..exchanges {
        data.extend_from_slice(format!("Original: message {i}\r\n").as_bytes());
        data.extend_from_slice(b"Encrypted: 109 101 115 115 97 103 101\r\n");
    }
    data
}

fn framing_benchmark(c: &mut Criterion) {
    let data = capture(256);

    let mut group = c.benchmark_group("framing");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("single_chunk", |b| {
        b.iter(|| {
            let mut framer = LineFramer::new();
            black_box(framer.push(black_box(&data)))
        })
    });

    group.bench_function("serial_reads_64", |b| {
        b.iter(|| {
            let mut framer = LineFramer::new();
            let mut lines = 0;
            for chunk in black_box(&data).chunks(64) {
                lines += framer.push(chunk).len();
            }
            black_box(lines)
        })
    });

    group.finish();
}

fn classify_benchmark(c: &mut Criterion) {
    let lines = [
        "Public key: (7, 187)",
        "Original: hello world",
        "Encrypted: 104 101 108 108 111",
        "Decrypted: hello world",
        "RSA demo ready",
    ];

    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(lines.len() as u64));

    group.bench_function("mixed_lines", |b| {
        b.iter(|| {
            for line in &lines {
                black_box(classify(black_box(line)));
            }
        })
    });

    group.bench_function("classify_and_track", |b| {
        b.iter(|| {
            let mut tracker = SessionTracker::new(History::new());
            for line in &lines {
                black_box(tracker.apply(classify(line)));
            }
        })
    });

    group.finish();
}

fn replay_benchmark(c: &mut Criterion) {
    let data = capture(256);
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("replay");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("session_pipeline", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(replay_bytes(&data, 64).await.unwrap()) })
    });

    group.finish();
}

criterion_group!(benches, framing_benchmark, classify_benchmark, replay_benchmark);
criterion_main!(benches);
