use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rostro_backend_sqlite::matcher::match_probe;
use rostro_backend_sqlite::models::identity::IdentityRecord;

fn build_gallery(n: usize, dim: usize) -> Vec<IdentityRecord> {
    (0..n)
        .map(|i| {
            let mut embedding = vec![0.0f32; dim];
            // spread records out so nothing sits near the origin probe
            embedding[i % dim] = 10.0 + (i as f32);
            IdentityRecord {
                name: format!("user-{}", i),
                embedding,
            }
        })
        .collect()
}

fn bench_scan_no_match(c: &mut Criterion) {
    let gallery = build_gallery(1_000, 512);
    let probe = vec![0.0f32; 512];
    c.bench_function("match_1000x512_no_match", |b| {
        b.iter(|| black_box(match_probe(black_box(&probe), black_box(&gallery), 0.7)));
    });
}

fn bench_scan_first_hit(c: &mut Criterion) {
    let mut gallery = build_gallery(1_000, 512);
    // plant a matching record at the front; the scan should stop there
    gallery[0].embedding = vec![0.0f32; 512];
    let probe = vec![0.0f32; 512];
    c.bench_function("match_1000x512_first_hit", |b| {
        b.iter(|| black_box(match_probe(black_box(&probe), black_box(&gallery), 0.7)));
    });
}

criterion_group!(benches, bench_scan_no_match, bench_scan_first_hit);
criterion_main!(benches);
