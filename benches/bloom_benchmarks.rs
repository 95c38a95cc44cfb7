use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::{Rng, distr::Alphanumeric};
use rotating_bloom_rs::{
    BloomConfigBuilder, BloomFilter, HashStrategy, NoCompression,
    RotatingBloomFilter, RotatingConfig, RotatingConfigBuilder,
};
use std::time::Duration;
use tokio::runtime::Runtime;

// Helper function to generate random string data
fn generate_random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn generate_test_data(count: usize) -> Vec<String> {
    (0..count).map(|_| generate_random_string(32)).collect()
}

fn rotating_config(capacity: usize, strategy: HashStrategy) -> RotatingConfig {
    let bloom = BloomConfigBuilder::default()
        .capacity(capacity)
        .false_positive_rate(0.001)
        .hash_strategy(strategy)
        .build()
        .expect("Failed to build bloom config");
    RotatingConfigBuilder::default()
        .bloom(bloom)
        .ttl(Duration::from_secs(3600))
        .build()
        .expect("Failed to build rotating config")
}

fn bench_static(c: &mut Criterion) {
    let mut group = c.benchmark_group("static_filter");

    for strategy in [HashStrategy::Default, HashStrategy::Optimal] {
        for capacity in [1_000, 100_000] {
            let filter = BloomFilter::new(
                rotating_config(capacity, strategy).bloom,
            )
            .expect("Failed to create filter");
            let data = generate_test_data(1_000);

            group.bench_with_input(
                BenchmarkId::new(format!("add_{strategy}"), capacity),
                &data,
                |b, data| {
                    b.iter(|| {
                        for item in data {
                            filter.add(item.as_bytes());
                        }
                    })
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("check_{strategy}"), capacity),
                &data,
                |b, data| {
                    b.iter(|| {
                        for item in data {
                            let _ = filter.check(item.as_bytes());
                        }
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_rotating(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create runtime");
    let _guard = rt.enter();
    let mut group = c.benchmark_group("rotating_filter");

    for capacity in [1_000, 100_000] {
        let config = rotating_config(capacity, HashStrategy::Optimal);
        let filter = RotatingBloomFilter::new(config.clone())
            .expect("Failed to create filter");
        let data = generate_test_data(1_000);

        group.bench_with_input(
            BenchmarkId::new("add", capacity),
            &data,
            |b, data| {
                b.iter(|| {
                    for item in data {
                        filter.add(item.as_bytes()).unwrap();
                    }
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("check", capacity),
            &data,
            |b, data| {
                b.iter(|| {
                    for item in data {
                        let _ = filter.check(item.as_bytes()).unwrap();
                    }
                })
            },
        );

        let peer = RotatingBloomFilter::new(config)
            .expect("Failed to create peer");
        for item in &data {
            peer.add(item.as_bytes()).unwrap();
        }
        group.bench_function(BenchmarkId::new("union", capacity), |b| {
            b.iter(|| filter.union((&peer).into()).unwrap())
        });

        group.bench_function(BenchmarkId::new("marshal_lz4", capacity), |b| {
            b.iter(|| filter.marshal_binary().unwrap())
        });

        group.bench_function(BenchmarkId::new("marshal_raw", capacity), |b| {
            b.iter(|| filter.marshal_binary_with(&NoCompression).unwrap())
        });

        let snapshot = filter.marshal_binary().unwrap();
        group.bench_function(BenchmarkId::new("unmarshal", capacity), |b| {
            b.iter(|| filter.unmarshal_binary(&snapshot).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_static, bench_rotating);
criterion_main!(benches);
