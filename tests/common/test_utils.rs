use rotating_bloom_rs::{
    BloomConfig, BloomConfigBuilder, HashStrategy, RotatingConfig,
    RotatingConfigBuilder,
};
use std::{fs, path::PathBuf, time::Duration};

/// Config shapes used across the integration tests.
#[allow(dead_code)]
pub const TEST_CAPACITY: usize = 100;
#[allow(dead_code)]
pub const TEST_FPR: f64 = 0.001;

#[allow(dead_code)]
pub fn bloom_config(
    capacity: usize,
    fpr: f64,
    hash_strategy: HashStrategy,
) -> BloomConfig {
    BloomConfigBuilder::default()
        .capacity(capacity)
        .false_positive_rate(fpr)
        .hash_strategy(hash_strategy)
        .build()
        .expect("Failed to build test bloom config")
}

#[allow(dead_code)]
pub fn rotating_config(
    capacity: usize,
    fpr: f64,
    hash_strategy: HashStrategy,
    ttl: Duration,
) -> RotatingConfig {
    RotatingConfigBuilder::default()
        .bloom(bloom_config(capacity, fpr, hash_strategy))
        .ttl(ttl)
        .build()
        .expect("Failed to build test rotating config")
}

/// Rotating config that never rotates within a test run.
#[allow(dead_code)]
pub fn still_config(hash_strategy: HashStrategy) -> RotatingConfig {
    rotating_config(
        TEST_CAPACITY,
        TEST_FPR,
        hash_strategy,
        Duration::from_secs(3600),
    )
}

// Helper function to generate consistent test data
#[allow(dead_code)]
pub fn generate_test_items(prefix: &str, count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| format!("{prefix}_{i:06}").into_bytes())
        .collect()
}

#[allow(dead_code)]
pub fn as_slices(items: &[Vec<u8>]) -> Vec<&[u8]> {
    items.iter().map(Vec::as_slice).collect()
}

/// Snapshot file that is removed when dropped
#[allow(dead_code)]
pub struct TestSnapshot {
    path: PathBuf,
}

#[allow(dead_code)]
impl TestSnapshot {
    pub fn new(test_name: &str) -> Self {
        let path = std::env::temp_dir()
            .join(format!("rbf_test_{}_{}.bin", test_name, std::process::id()));
        Self { path }
    }

    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }
}

impl Drop for TestSnapshot {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}
