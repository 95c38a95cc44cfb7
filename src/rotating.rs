//! Three-generation rotating Bloom filter
pub mod config;
pub mod filter;
mod task;

pub use config::{
    MAX_TTL, RotatingConfig, RotatingConfigBuilder, RotatingConfigBuilderError,
};
pub use filter::RotatingBloomFilter;
