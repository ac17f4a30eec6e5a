use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use grit_loose::LooseStore;
use grit_object::ObjectKind;
use std::io::Read;

fn bench_loose(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let store = LooseStore::open(dir.path());

    let payload: Vec<u8> = (0..256 * 1024u32).map(|i| (i % 251) as u8).collect();
    let name = store.write(ObjectKind::Blob, &payload).unwrap();

    let mut group = c.benchmark_group("loose");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("read_256kib", |b| {
        b.iter(|| black_box(store.read(&name).unwrap().unwrap()))
    });

    group.bench_function("stream_256kib", |b| {
        b.iter(|| {
            let mut stream = store.stream(&name).unwrap().unwrap();
            let mut out = Vec::with_capacity(payload.len());
            stream.read_to_end(&mut out).unwrap();
            black_box(out)
        })
    });

    group.bench_function("read_header_only", |b| {
        b.iter(|| black_box(store.read_header(&name).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_loose);
criterion_main!(benches);
