use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use modfetch_fetch::plan;

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for file_size in [1024 * 1024u64, 1024 * 1024 * 1024, 50 * 1024 * 1024 * 1024].iter() {
        for per_file_chunks in [4u32, 16, 64].iter() {
            group.throughput(Throughput::Bytes(*file_size));
            group.bench_with_input(
                BenchmarkId::new("file_size", format!("{file_size}_chunks_{per_file_chunks}")),
                &(*file_size, *per_file_chunks),
                |b, &(file_size, per_file_chunks)| {
                    b.iter(|| {
                        black_box(plan(
                            black_box(Some(file_size)),
                            black_box(true),
                            black_box(8 * 1024 * 1024),
                            black_box(per_file_chunks),
                        ))
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_plan_single_stream_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_single_stream");

    group.bench_function("no_range_support", |b| {
        b.iter(|| black_box(plan(black_box(Some(1024 * 1024 * 1024)), black_box(false), black_box(8 * 1024 * 1024), black_box(16))));
    });

    group.finish();
}

criterion_group!(benches, bench_plan, bench_plan_single_stream_path);
criterion_main!(benches);
