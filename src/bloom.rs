//! Standard Bloom Filter implementation
pub mod config;
pub mod filter;

pub use config::{
    BloomConfig, BloomConfigBuilder, BloomConfigBuilderError, BloomParams,
};
pub use filter::BloomFilter;
