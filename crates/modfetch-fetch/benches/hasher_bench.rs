use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use modfetch_verify::{hash_reader, Hasher, Sha256Hasher};

fn bench_hash_reader(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_reader");

    for size in [1024 * 1024u64, 16 * 1024 * 1024, 64 * 1024 * 1024].iter() {
        let data = vec![0x5au8; *size as usize];
        group.throughput(Throughput::Bytes(*size));
        group.bench_with_input(BenchmarkId::new("bytes", size), &data, |b, data| {
            b.iter(|| black_box(hash_reader(black_box(&data[..])).unwrap()));
        });
    }

    group.finish();
}

fn bench_incremental_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("sha256_incremental_update");
    let chunk = vec![0xa5u8; 1024 * 1024];
    group.throughput(Throughput::Bytes(chunk.len() as u64));

    group.bench_function("1MiB_chunk", |b| {
        b.iter(|| {
            let mut hasher = Sha256Hasher::new();
            hasher.update(black_box(&chunk));
            black_box(hasher.finalize())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_hash_reader, bench_incremental_update);
criterion_main!(benches);
