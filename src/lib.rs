//! Rotating Bloom filter with union and binary snapshots.
//!
//! Answers "has this byte string been seen in roughly the last few ttls?"
//! without storing the strings, e.g. to reject revoked tokens at a gateway.
//!
//! HowTo:
//!    * Generations: the filter keeps three static Bloom filters, `previous`,
//!      `current` and `next`, all sized from the same config.
//!    * Insertion: an item is added to `current` and `next`.
//!    * Query: an item is reported present when `previous` or `current`
//!      holds it. `next` is never queried.
//!    * Rotation: once per ttl a background task shifts `current` into
//!      `previous`, `next` into `current` and starts an empty `next`.
//!      An item therefore stays visible for between 2 and 3 ttls.
//!
//! Union:
//!    * Filters built from the same capacity, false positive rate and hash
//!      strategy can be merged generation by generation, so instances can
//!      share what they have seen.
//!
//! Obvious problems:
//!    * False Positives: as with any Bloom filter, "present" only means
//!      "probably present".
//!    * The `default` hash strategy has five hash functions, filters sized
//!      for more hashes are weaker than their config suggests. Prefer
//!      `optimal`.

mod bitfield;
pub mod bloom;
pub mod codec;
pub mod common;
mod error;
pub mod filter;
#[cfg(feature = "server")]
pub mod gateway;
mod hash;
pub mod rotating;
#[cfg(feature = "server")]
pub mod rpc;

pub use bloom::{BloomConfig, BloomConfigBuilder, BloomFilter, BloomParams};
pub use codec::{Compressor, Lz4Compressor, NoCompression};
pub use error::{FilterError, FilterKind, Mismatch, Result};
pub use filter::{
    BulkMembershipFilter, EmptyFilter, Filter, FilterRef, MembershipFilter,
};
pub use hash::{
    HashFunction, HashStrategy, candidate_indices, hashers_agree,
    optimal_bit_vector_size, optimal_num_hashes,
};
pub use rotating::{
    RotatingBloomFilter, RotatingConfig, RotatingConfigBuilder,
    RotatingConfigBuilderError,
};
#[cfg(feature = "server")]
pub use rpc::{AppState, FilterRegistry, ServerConfig, ServerConfigBuilder};
