//! The common membership contract and the operand types for union.

use crate::bloom::BloomFilter;
use crate::codec;
use crate::error::{FilterError, FilterKind, Result};
use crate::rotating::RotatingBloomFilter;

/// Core operations shared by every filter kind.
pub trait MembershipFilter {
    fn kind(&self) -> FilterKind;

    fn add(&self, item: &[u8]) -> Result<()>;

    /// False means definitely absent, true means probably present.
    fn check(&self, item: &[u8]) -> Result<bool>;

    /// Merges `other` into this filter and returns the new fill ratio.
    fn union(&self, other: FilterRef<'_>) -> Result<f64>;

    fn fill_ratio(&self) -> Result<f64>;
}

/// Batch operations taking one lock acquisition per call.
pub trait BulkMembershipFilter {
    fn add_bulk(&self, items: &[&[u8]]) -> Result<()>;
    fn check_bulk(&self, items: &[&[u8]]) -> Result<Vec<bool>>;
}

/// Borrowed union operand.
#[derive(Debug, Clone, Copy)]
pub enum FilterRef<'a> {
    Static(&'a BloomFilter),
    Rotating(&'a RotatingBloomFilter),
    Empty(&'a EmptyFilter),
}

impl FilterRef<'_> {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterRef::Static(_) => FilterKind::Static,
            FilterRef::Rotating(_) => FilterKind::Rotating,
            FilterRef::Empty(_) => FilterKind::Empty,
        }
    }
}

impl<'a> From<&'a BloomFilter> for FilterRef<'a> {
    fn from(filter: &'a BloomFilter) -> Self {
        FilterRef::Static(filter)
    }
}

impl<'a> From<&'a RotatingBloomFilter> for FilterRef<'a> {
    fn from(filter: &'a RotatingBloomFilter) -> Self {
        FilterRef::Rotating(filter)
    }
}

impl<'a> From<&'a EmptyFilter> for FilterRef<'a> {
    fn from(filter: &'a EmptyFilter) -> Self {
        FilterRef::Empty(filter)
    }
}

impl<'a> From<&'a Filter> for FilterRef<'a> {
    fn from(filter: &'a Filter) -> Self {
        match filter {
            Filter::Static(f) => FilterRef::Static(f),
            Filter::Rotating(f) => FilterRef::Rotating(f),
            Filter::Empty(f) => FilterRef::Empty(f),
        }
    }
}

/// A filter that holds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyFilter;

impl MembershipFilter for EmptyFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Empty
    }

    fn add(&self, _item: &[u8]) -> Result<()> {
        Ok(())
    }

    fn check(&self, _item: &[u8]) -> Result<bool> {
        Ok(false)
    }

    fn union(&self, _other: FilterRef<'_>) -> Result<f64> {
        Ok(0.0)
    }

    fn fill_ratio(&self) -> Result<f64> {
        Ok(0.0)
    }
}

impl MembershipFilter for BloomFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Static
    }

    fn add(&self, item: &[u8]) -> Result<()> {
        BloomFilter::add(self, item);
        Ok(())
    }

    fn check(&self, item: &[u8]) -> Result<bool> {
        Ok(BloomFilter::check(self, item))
    }

    fn union(&self, other: FilterRef<'_>) -> Result<f64> {
        match other {
            FilterRef::Static(other) => BloomFilter::union(self, other),
            other => Err(FilterError::IncompatibleType {
                expected: FilterKind::Static,
                found: other.kind(),
            }),
        }
    }

    fn fill_ratio(&self) -> Result<f64> {
        Ok(BloomFilter::fill_ratio(self))
    }
}

impl BulkMembershipFilter for BloomFilter {
    fn add_bulk(&self, items: &[&[u8]]) -> Result<()> {
        items.iter().for_each(|item| BloomFilter::add(self, item));
        Ok(())
    }

    fn check_bulk(&self, items: &[&[u8]]) -> Result<Vec<bool>> {
        Ok(items.iter().map(|item| BloomFilter::check(self, item)).collect())
    }
}

impl MembershipFilter for RotatingBloomFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Rotating
    }

    fn add(&self, item: &[u8]) -> Result<()> {
        RotatingBloomFilter::add(self, item)
    }

    fn check(&self, item: &[u8]) -> Result<bool> {
        RotatingBloomFilter::check(self, item)
    }

    fn union(&self, other: FilterRef<'_>) -> Result<f64> {
        RotatingBloomFilter::union(self, other)
    }

    fn fill_ratio(&self) -> Result<f64> {
        RotatingBloomFilter::fill_ratio(self)
    }
}

impl BulkMembershipFilter for RotatingBloomFilter {
    fn add_bulk(&self, items: &[&[u8]]) -> Result<()> {
        RotatingBloomFilter::add_bulk(self, items)
    }

    fn check_bulk(&self, items: &[&[u8]]) -> Result<Vec<bool>> {
        RotatingBloomFilter::check_bulk(self, items)
    }
}

/// An owned filter of any kind, as decoded from a snapshot.
#[derive(Debug)]
pub enum Filter {
    Static(BloomFilter),
    Rotating(RotatingBloomFilter),
    Empty(EmptyFilter),
}

impl Filter {
    /// Decodes either snapshot kind.
    ///
    /// Raw envelopes are recognised by their magic. Anything else is taken
    /// to be an LZ4-compressed rotating snapshot, which needs a tokio
    /// runtime to host its rotation task.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let filter = match codec::peek_kind(data) {
            Some(FilterKind::Static) => {
                Filter::Static(codec::decode_bloom(data)?)
            }
            Some(FilterKind::Rotating) => {
                Filter::Rotating(RotatingBloomFilter::from_bytes_with(
                    data,
                    &codec::NoCompression,
                )?)
            }
            _ => Filter::Rotating(RotatingBloomFilter::from_bytes(data)?),
        };
        Ok(filter)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Filter::Static(f) => codec::encode_bloom(f),
            Filter::Rotating(f) => f.marshal_binary(),
            Filter::Empty(_) => Err(FilterError::EncodeError(
                "an empty filter has no binary form".into(),
            )),
        }
    }

    fn inner(&self) -> &dyn MembershipFilter {
        match self {
            Filter::Static(f) => f,
            Filter::Rotating(f) => f,
            Filter::Empty(f) => f,
        }
    }
}

impl MembershipFilter for Filter {
    fn kind(&self) -> FilterKind {
        self.inner().kind()
    }

    fn add(&self, item: &[u8]) -> Result<()> {
        self.inner().add(item)
    }

    fn check(&self, item: &[u8]) -> Result<bool> {
        self.inner().check(item)
    }

    fn union(&self, other: FilterRef<'_>) -> Result<f64> {
        self.inner().union(other)
    }

    fn fill_ratio(&self) -> Result<f64> {
        self.inner().fill_ratio()
    }
}
