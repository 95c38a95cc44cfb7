//! Binary snapshots of static and rotating filters.
//!
//! Every snapshot is an envelope: the `RBLM` magic, one format version byte,
//! one kind byte, then a bincode body. The rotating form compresses the whole
//! envelope, so its bytes on the wire start with the compressor's framing
//! rather than the magic.

use crate::bitfield::BitField;
use crate::bloom::{BloomConfig, BloomFilter, BloomParams};
use crate::error::{FilterError, FilterKind, Result};
use crate::hash::HashStrategy;
use crate::rotating::RotatingConfig;
use crate::rotating::filter::Generations;
use bincode::{Decode, Encode};
use std::time::Duration;

const MAGIC: &[u8; 4] = b"RBLM";
const FORMAT_VERSION: u8 = 1;
const KIND_STATIC: u8 = 1;
const KIND_ROTATING: u8 = 2;
const HEADER_LEN: usize = MAGIC.len() + 2;
const DECODE_LIMIT: usize = 1 << 30;
const MAX_LZ4_RATIO: usize = 255;

/// Pluggable compression for rotating snapshots.
///
/// The same compressor must be used to marshal and unmarshal a snapshot.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// LZ4 block compression with the uncompressed size prepended.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let Some(prefix) = data.first_chunk::<4>() else {
            return Err(FilterError::DecodeError(
                "LZ4 input too short".into(),
            ));
        };
        // LZ4 cannot expand a block by more than 255x
        let size = u32::from_le_bytes(*prefix) as usize;
        if size > data.len().saturating_mul(MAX_LZ4_RATIO) {
            return Err(FilterError::DecodeError(format!(
                "LZ4 size prefix {size} is implausible for {} bytes",
                data.len()
            )));
        }
        if size > DECODE_LIMIT + HEADER_LEN {
            return Err(FilterError::DecodeError(format!(
                "LZ4 size prefix {size} exceeds the snapshot limit"
            )));
        }
        lz4_flex::decompress_size_prepended(data).map_err(|e| {
            FilterError::DecodeError(format!("LZ4 decompression failed: {e}"))
        })
    }
}

/// Leaves the envelope as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

#[derive(Encode, Decode)]
struct WireConfig {
    capacity: u64,
    false_positive_rate: f64,
    hash_name: String,
}

impl WireConfig {
    fn from_config(config: &BloomConfig) -> Self {
        Self {
            capacity: config.capacity as u64,
            false_positive_rate: config.false_positive_rate,
            hash_name: config.hash_strategy.name().to_string(),
        }
    }

    fn into_config(self) -> Result<BloomConfig> {
        let hash_strategy: HashStrategy =
            self.hash_name.parse().map_err(into_decode_error)?;
        let config = BloomConfig {
            capacity: to_usize(self.capacity, "capacity")?,
            false_positive_rate: self.false_positive_rate,
            hash_strategy,
        };
        config.validate().map_err(into_decode_error)?;
        Ok(config)
    }
}

#[derive(Encode, Decode)]
struct WireBloom {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u64,
    hash_name: String,
    config: WireConfig,
}

impl WireBloom {
    fn from_filter(filter: &BloomFilter) -> Self {
        Self {
            bits: filter.bits().to_words(),
            num_bits: filter.num_bits() as u64,
            num_hashes: filter.num_hashes() as u64,
            hash_name: filter.config().hash_strategy.name().to_string(),
            config: WireConfig::from_config(filter.config()),
        }
    }

    fn into_filter(self) -> Result<BloomFilter> {
        let config = self.config.into_config()?;
        if self.hash_name != config.hash_strategy.name() {
            return Err(FilterError::DecodeError(format!(
                "hash name '{}' does not match config '{}'",
                self.hash_name, config.hash_strategy
            )));
        }
        let bits =
            BitField::from_words(to_usize(self.num_bits, "m")?, self.bits)?;
        BloomFilter::from_parts(config, bits, to_usize(self.num_hashes, "k")?)
            .map_err(into_decode_error)
    }
}

#[derive(Encode, Decode)]
struct WireRotating {
    previous: WireBloom,
    current: WireBloom,
    next: WireBloom,
    config: WireConfig,
    ttl: Duration,
}

pub fn encode_bloom(filter: &BloomFilter) -> Result<Vec<u8>> {
    seal(KIND_STATIC, &WireBloom::from_filter(filter))
}

pub fn decode_bloom(data: &[u8]) -> Result<BloomFilter> {
    let wire: WireBloom = open(data, KIND_STATIC)?;
    wire.into_filter()
}

pub(crate) fn encode_rotating(
    generations: &Generations,
    compressor: &dyn Compressor,
) -> Result<Vec<u8>> {
    let envelope = seal(
        KIND_ROTATING,
        &WireRotating {
            previous: WireBloom::from_filter(&generations.previous),
            current: WireBloom::from_filter(&generations.current),
            next: WireBloom::from_filter(&generations.next),
            config: WireConfig::from_config(&generations.config.bloom),
            ttl: generations.config.ttl,
        },
    )?;
    compressor.compress(&envelope)
}

/// Decodes and fully validates a rotating snapshot without touching any
/// live filter.
pub(crate) fn decode_rotating(
    data: &[u8],
    compressor: &dyn Compressor,
) -> Result<Generations> {
    let envelope = compressor.decompress(data)?;
    let wire: WireRotating = open(&envelope, KIND_ROTATING)?;

    let config = RotatingConfig {
        bloom: wire.config.into_config()?,
        ttl: wire.ttl,
    };
    config.validate().map_err(into_decode_error)?;

    let generations = Generations {
        previous: wire.previous.into_filter()?,
        current: wire.current.into_filter()?,
        next: wire.next.into_filter()?,
        config,
    };
    check_generation_shapes(&generations)?;
    Ok(generations)
}

/// `current` and `next` must be sized from the shared config. `previous`
/// is either sized the same or is the placeholder of the same strategy.
fn check_generation_shapes(generations: &Generations) -> Result<()> {
    let shared = &generations.config.bloom;
    let placeholder = BloomConfig::placeholder(shared.hash_strategy);
    let checks = [
        ("previous", &generations.previous, [shared, &placeholder]),
        ("current", &generations.current, [shared, shared]),
        ("next", &generations.next, [shared, shared]),
    ];

    for (name, filter, allowed) in checks {
        if !allowed.contains(&filter.config()) {
            return Err(FilterError::DecodeError(format!(
                "{name} generation config does not match the filter config"
            )));
        }
        let params = BloomParams::from(filter.config());
        if filter.num_bits() != params.bit_vector_size
            || filter.num_hashes() != params.num_hashes
        {
            return Err(FilterError::DecodeError(format!(
                "{name} generation has m={} k={}, its config derives m={} k={}",
                filter.num_bits(),
                filter.num_hashes(),
                params.bit_vector_size,
                params.num_hashes
            )));
        }
    }
    Ok(())
}

/// Kind of an uncompressed envelope, `None` if `data` is not one.
pub(crate) fn peek_kind(data: &[u8]) -> Option<FilterKind> {
    if data.len() < HEADER_LEN || &data[..MAGIC.len()] != MAGIC {
        return None;
    }
    kind_from_byte(data[MAGIC.len() + 1])
}

fn seal<T: Encode>(kind: u8, body: &T) -> Result<Vec<u8>> {
    let body = bincode::encode_to_vec(body, bincode::config::standard())?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.push(kind);
    out.extend_from_slice(&body);
    Ok(out)
}

fn open<T: Decode<()>>(data: &[u8], expected: u8) -> Result<T> {
    if data.len() < HEADER_LEN {
        return Err(FilterError::DecodeError(format!(
            "snapshot too short: {} bytes",
            data.len()
        )));
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(FilterError::DecodeError("bad snapshot magic".into()));
    }
    let version = data[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(FilterError::DecodeError(format!(
            "unsupported snapshot version {version}"
        )));
    }
    let kind = data[MAGIC.len() + 1];
    if kind != expected {
        let found = kind_from_byte(kind).ok_or_else(|| {
            FilterError::DecodeError(format!("unknown snapshot kind {kind}"))
        })?;
        return Err(FilterError::IncompatibleType {
            expected: kind_from_byte(expected).unwrap_or(FilterKind::Empty),
            found,
        });
    }

    let config = bincode::config::standard().with_limit::<DECODE_LIMIT>();
    let (body, read) = bincode::decode_from_slice(&data[HEADER_LEN..], config)?;
    if HEADER_LEN + read != data.len() {
        return Err(FilterError::DecodeError(format!(
            "{} trailing bytes after snapshot",
            data.len() - HEADER_LEN - read
        )));
    }
    Ok(body)
}

fn kind_from_byte(kind: u8) -> Option<FilterKind> {
    match kind {
        KIND_STATIC => Some(FilterKind::Static),
        KIND_ROTATING => Some(FilterKind::Rotating),
        _ => None,
    }
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        FilterError::DecodeError(format!("{what} {value} does not fit usize"))
    })
}

fn into_decode_error(err: FilterError) -> FilterError {
    match err {
        FilterError::DecodeError(_) => err,
        other => FilterError::DecodeError(other.to_string()),
    }
}
