use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use grit_pack::delta;

/// A delta that reshuffles a 1 MiB base in 4 KiB copies with small inserts.
fn synthetic_delta(base: &[u8], result_len: &mut usize) -> Vec<u8> {
    let chunk = 4096;
    let mut instructions = Vec::new();
    let mut produced = 0;

    let mut at = base.len() - chunk;
    while produced + chunk <= base.len() {
        instructions.extend_from_slice(&delta::encode_copy(at, chunk));
        produced += chunk;
        instructions.extend_from_slice(&delta::encode_insert(b"::"));
        produced += 2;
        at = if at >= chunk { at - chunk } else { base.len() - chunk };
    }

    let mut out = delta::write_size(base.len());
    out.extend_from_slice(&delta::write_size(produced));
    out.extend_from_slice(&instructions);
    *result_len = produced;
    out
}

fn bench_apply(c: &mut Criterion) {
    let base: Vec<u8> = (0..1024 * 1024u32).map(|i| (i % 255) as u8).collect();
    let mut result_len = 0;
    let payload = synthetic_delta(&base, &mut result_len);

    let mut group = c.benchmark_group("delta");
    group.throughput(Throughput::Bytes(result_len as u64));
    group.bench_function("apply_1mib_shuffle", |b| {
        b.iter(|| delta::apply(black_box(&base), black_box(&payload)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_apply);
criterion_main!(benches);
