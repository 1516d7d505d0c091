use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fzclus_core::{cluster, ClusterConfig, DigestStore};
use ssdeep::RawFuzzyHash;
use std::collections::BTreeSet;
use std::time::Duration;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Deterministic synthetic digest set: families of near-identical block
/// hashes spread over a few blocksize levels, so some pairs score high and
/// most score zero.
fn generate_digests(count: usize) -> BTreeSet<RawFuzzyHash> {
    let mut digests = BTreeSet::new();
    let mut state = 0x2545f491u64;
    let mut i = 0;
    while digests.len() < count {
        let family = i % (count / 8 + 1);
        let level = family % 4 + 4;
        let mut bh1: Vec<u8> = (0..32)
            .map(|k| ALPHABET[(family * 7 + k * 3) % ALPHABET.len()])
            .collect();
        // Perturb a couple of positions per member to vary edit distance.
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        bh1[(state % 32) as usize] = ALPHABET[(state >> 8) as usize % ALPHABET.len()];
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        bh1[(state % 32) as usize] = ALPHABET[(state >> 8) as usize % ALPHABET.len()];
        let line = format!(
            "{}:{}:{}",
            3u32 << level,
            String::from_utf8(bh1).unwrap(),
            family % 100,
        );
        digests.insert(line.parse().unwrap());
        i += 1;
    }
    digests
}

fn bench_store_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_build");
    for size in [1_000, 10_000] {
        let digests = generate_digests(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &digests, |b, digests| {
            b.iter(|| DigestStore::from_digests(black_box(digests.clone())))
        });
    }
    group.finish();
}

fn bench_cluster(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster");
    group.sample_size(10);
    for size in [1_000, 5_000] {
        let digests = generate_digests(size);
        group.throughput(Throughput::Elements(size as u64));
        for workers in [1, 4] {
            let config = ClusterConfig {
                workers,
                progress_interval: Duration::from_millis(50),
                ..ClusterConfig::default()
            };
            group.bench_with_input(
                BenchmarkId::new(format!("{workers}w"), size),
                &digests,
                |b, digests| {
                    b.iter(|| {
                        let store = DigestStore::from_digests(digests.clone());
                        cluster(&store, &config, |_| {}).unwrap();
                        black_box(store.clusters().len())
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_store_build, bench_cluster);
criterion_main!(benches);
