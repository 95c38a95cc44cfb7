use super::registry::FilterRegistry;
use crate::bloom::BloomConfig;
use crate::error::{FilterError, Result};
use crate::hash::HashStrategy;
use crate::rotating::RotatingConfig;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddRequest {
    pub elems: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddResponse {
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckRequest {
    pub elems: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckResponse {
    pub checks: Vec<bool>,
}

/// Mean fill ratio after a union.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnionResponse {
    pub capacity: f64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InfoResponse {
    pub capacity: usize,
    pub false_positive_rate: f64,
    pub hash_strategy: String,
    pub ttl_secs: f64,
    pub bit_vector_size: usize,
    pub num_hashes: usize,
    pub fill_ratio: f64,
    /// previous, current, next
    pub generation_fill_ratios: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

pub struct AppState {
    pub registry: FilterRegistry,
}

#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned")]
pub struct ServerConfig {
    #[builder(default = "\"127.0.0.1\".to_string()")]
    pub server_host: String,
    #[builder(default = "1234")]
    pub server_port: u16,
    #[builder(default = "10_000_000")]
    pub bloom_capacity: usize,
    #[builder(default = "1e-7")]
    pub bloom_false_positive_rate: f64,
    #[builder(default = "HashStrategy::Optimal")]
    pub bloom_hash_strategy: HashStrategy,
    #[builder(default = "Duration::from_secs(1000)")]
    pub bloom_ttl: Duration,
    /// Restored at startup and written at shutdown when set
    #[builder(default)]
    pub bloom_snapshot_path: Option<PathBuf>,
    #[builder(default = "Duration::from_secs(5)")]
    pub size_log_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("SERVER_PORT", "1234")?,
            bloom_capacity: env_or("BLOOM_CAPACITY", "10000000")?,
            bloom_false_positive_rate: env_or(
                "BLOOM_FALSE_POSITIVE_RATE",
                "0.0000001",
            )?,
            bloom_hash_strategy: env_or("BLOOM_HASH_STRATEGY", "optimal")?,
            bloom_ttl: Duration::from_secs(env_or("BLOOM_TTL_SECS", "1000")?),
            bloom_snapshot_path: std::env::var("BLOOM_SNAPSHOT_PATH")
                .ok()
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            size_log_interval: Duration::from_secs(env_or(
                "BLOOM_SIZE_LOG_SECS",
                "5",
            )?),
        })
    }

    pub fn rotating_config(&self) -> Result<RotatingConfig> {
        let config = RotatingConfig {
            bloom: BloomConfig {
                capacity: self.bloom_capacity,
                false_positive_rate: self.bloom_false_positive_rate,
                hash_strategy: self.bloom_hash_strategy,
            },
            ttl: self.bloom_ttl,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn env_or<T>(var_name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value =
        std::env::var(var_name).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e: T::Err| FilterError::EnvParseError {
        var_name: var_name.to_string(),
        error: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_env_defaults() {
        let config = ServerConfigBuilder::default().build().unwrap();
        assert_eq!(config.addr(), "127.0.0.1:1234");
        assert_eq!(config.bloom_capacity, 10_000_000);
        assert_eq!(config.bloom_ttl, Duration::from_secs(1000));
        assert!(config.bloom_snapshot_path.is_none());

        let rotating = config.rotating_config().unwrap();
        assert_eq!(rotating.bloom.hash_strategy, HashStrategy::Optimal);
    }

    #[test]
    fn test_invalid_server_filter_config() {
        let config = ServerConfigBuilder::default()
            .bloom_false_positive_rate(2.0)
            .build()
            .unwrap();
        assert!(matches!(
            config.rotating_config(),
            Err(FilterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_env_parse_error_names_variable() {
        let err = env_or::<u16>("RBF_TEST_UNSET_PORT_VARIABLE", "not-a-port")
            .unwrap_err();
        match err {
            FilterError::EnvParseError {
                var_name, value, ..
            } => {
                assert_eq!(var_name, "RBF_TEST_UNSET_PORT_VARIABLE");
                assert_eq!(value, "not-a-port");
            }
            other => panic!("Expected EnvParseError, got {other:?}"),
        }
    }
}
