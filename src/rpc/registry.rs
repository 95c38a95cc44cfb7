use crate::codec::Lz4Compressor;
use crate::error::{FilterError, Result};
use crate::rotating::{RotatingBloomFilter, RotatingConfig};
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Owner of the one rotating filter served over RPC.
///
/// Cloning is cheap and every clone sees the same filter. Every operation
/// before [`init`](Self::init) fails with [`FilterError::NotInitialized`].
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    slot: Arc<RwLock<Option<Arc<RotatingBloomFilter>>>>,
    scope: CancellationToken,
}

impl FilterRegistry {
    /// Filters created by this registry rotate until `scope` is cancelled.
    pub fn new(scope: CancellationToken) -> Self {
        Self {
            slot: Arc::default(),
            scope,
        }
    }

    /// Builds a fresh filter, closing the one it replaces.
    pub fn init(
        &self,
        config: RotatingConfig,
    ) -> Result<Arc<RotatingBloomFilter>> {
        let filter =
            Arc::new(RotatingBloomFilter::with_scope(config, &self.scope)?);
        if let Some(old) = self.swap(Some(Arc::clone(&filter))) {
            old.close();
            debug!("Closed replaced filter");
        }
        info!("Rotating filter initialized");
        Ok(filter)
    }

    pub fn filter(&self) -> Result<Arc<RotatingBloomFilter>> {
        self.slot
            .read()
            .map_err(|_| {
                FilterError::LockError(
                    "Failed to acquire read lock on registry".to_string(),
                )
            })?
            .clone()
            .ok_or(FilterError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.filter().is_ok()
    }

    /// Adds every element and returns how many were added.
    pub fn add(&self, elems: &[&[u8]]) -> Result<usize> {
        self.filter()?.add_bulk(elems)?;
        Ok(elems.len())
    }

    pub fn check(&self, elems: &[&[u8]]) -> Result<Vec<bool>> {
        self.filter()?.check_bulk(elems)
    }

    /// Merges a serialized rotating filter into the served one.
    pub fn union(&self, data: &[u8]) -> Result<f64> {
        self.filter()?.union_encoded(data)
    }

    pub fn snapshot(&self) -> Result<Vec<u8>> {
        self.filter()?.marshal_binary()
    }

    /// Loads a snapshot into the served filter, or serves a new one built
    /// from it when nothing was initialized yet.
    pub fn restore(&self, data: &[u8]) -> Result<()> {
        match self.filter() {
            Ok(filter) => filter.unmarshal_binary(data),
            Err(FilterError::NotInitialized) => {
                let filter = RotatingBloomFilter::from_bytes_with_scope(
                    data,
                    &Lz4Compressor,
                    &self.scope,
                )?;
                if let Some(old) = self.swap(Some(Arc::new(filter))) {
                    old.close();
                }
                info!("Rotating filter restored from snapshot");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Closes and forgets the served filter.
    pub fn close(&self) {
        if let Some(filter) = self.swap(None) {
            filter.close();
            info!("Rotating filter closed");
        }
    }

    fn swap(
        &self,
        filter: Option<Arc<RotatingBloomFilter>>,
    ) -> Option<Arc<RotatingBloomFilter>> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, filter)
    }
}
