//! Criterion benchmarks for the bridge handshake codec.
//!
//! The handshake runs once per accepted connection, inline in the accept loop,
//! so framing and status decoding must stay far below connection setup cost.
//!
//! Run with:
//! ```bash
//! cargo bench --package adb-forward-core --bench handshake_bench
//! ```

use adb_forward_core::{decode_status, encode_request, ForwardCommand, ForwardPort};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_encode_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_request");
    for port in [1u16, 9000, 65535] {
        let command = ForwardCommand::loopback(ForwardPort::new(port).unwrap());
        group.bench_with_input(BenchmarkId::from_parameter(port), &command, |b, cmd| {
            b.iter(|| encode_request(black_box(&cmd.to_string())).unwrap())
        });
    }
    group.finish();
}

fn bench_decode_status(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_status");
    for (name, reply) in [
        ("okay", &b"OKAY"[..]),
        ("fail", &b"FAIL0004oops"[..]),
        ("unknown", &b"WHAT"[..]),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), reply, |b, bytes| {
            b.iter(|| decode_status(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode_request, bench_decode_status);
criterion_main!(benches);
