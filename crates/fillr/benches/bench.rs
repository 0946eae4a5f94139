use core::hint::black_box;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fillr::FormatKind;

/// Drains one full generation and returns the byte total, which the
/// optimizer cannot elide.
fn drain(kind: FormatKind, target: u64) -> u64 {
    let mut total = 0u64;
    for chunk in kind.encoder().produce(target) {
        total += chunk.expect("encoder fault").len() as u64;
    }
    total
}

fn encoder_throughput(c: &mut Criterion) {
    const TARGET: u64 = 16 * 1024 * 1024;

    let mut group = c.benchmark_group("encode/16MiB");
    group.throughput(Throughput::Bytes(TARGET));
    for kind in FormatKind::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            b.iter(|| {
                let total = drain(kind, TARGET);
                assert_eq!(total, TARGET);
                black_box(total)
            });
        });
    }
    group.finish();
}

fn small_artifacts(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode/minimum");
    for kind in FormatKind::ALL {
        let target = kind.min_size().max(64);
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            b.iter(|| black_box(drain(kind, target)));
        });
    }
    group.finish();
}

criterion_group!(benches, encoder_throughput, small_artifacts);
criterion_main!(benches);
