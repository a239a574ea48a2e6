use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use xmss_pots::adrs::{Adrs, AdrsType};
use xmss_pots::chain::{ChainBackend, CipherChain, HashChain};
use xmss_pots::ParameterSet;

fn chain_step_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_step");
    let params = ParameterSet::xmss_sha2_10_256();
    let adrs = Adrs::from(AdrsType::Ots);
    let value = [7u8; 32];
    let pub_seed = [3u8; 32];

    let hash_chain = HashChain::new(&params);
    group.bench_function(BenchmarkId::new("hash", "F"), |b| {
        b.iter(|| black_box(hash_chain.chain(&value, 0, 1, &pub_seed, &adrs)));
    });

    for n in [16, 24, 32] {
        let cipher_chain = CipherChain::new(n, 16).unwrap();
        let rung_keys = vec![5u8; 16 * n];
        group.bench_function(BenchmarkId::new("cipher", format!("aes{}", 8 * n)), |b| {
            b.iter(|| black_box(cipher_chain.chain(&value[..n], 0, 1, &rung_keys, &adrs)));
        });
    }

    group.finish();
}

criterion_group!(benches, chain_step_benchmarks);
criterion_main!(benches);
