use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::OsRng;
use rand::RngCore;
use xmss_pots::adrs::{Adrs, AdrsType};
use xmss_pots::wots::Wots;
use xmss_pots::ParameterSet;

fn ots_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("OTS");

    for (name, params) in [
        ("wots", ParameterSet::xmss_sha2_10_256()),
        ("pots", ParameterSet::pots_sha2_10_256()),
    ] {
        let wots = Wots::new(&params);
        let mut sk_seed = [0u8; 32];
        let mut pub_seed = [0u8; 32];
        let mut message = [0u8; 32];
        OsRng.fill_bytes(&mut sk_seed);
        OsRng.fill_bytes(&mut pub_seed);
        OsRng.fill_bytes(&mut message);
        let adrs = Adrs::from(AdrsType::Ots);

        group.bench_function(BenchmarkId::new("keypair", name), |b| {
            b.iter(|| black_box(wots.keypair(&sk_seed, &pub_seed, &adrs)));
        });

        group.bench_function(BenchmarkId::new("sign", name), |b| {
            b.iter_batched(
                || wots.keypair(&sk_seed, &pub_seed, &adrs),
                |key_pair| black_box(wots.sign(key_pair, &message, &pub_seed, &adrs).unwrap()),
                criterion::BatchSize::SmallInput,
            );
        });

        let key_pair = wots.keypair(&sk_seed, &pub_seed, &adrs);
        let public = key_pair.public_key().to_vec();
        let signature = wots.sign(key_pair, &message, &pub_seed, &adrs).unwrap();
        group.bench_function(BenchmarkId::new("verify", name), |b| {
            b.iter(|| {
                assert!(black_box(wots.verify(
                    &signature, &message, &public, &pub_seed, &adrs
                )));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, ots_benchmarks);
criterion_main!(benches);
