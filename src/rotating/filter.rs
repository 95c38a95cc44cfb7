use super::config::RotatingConfig;
use super::task::{RotationTask, current_runtime};
use crate::bloom::{BloomConfig, BloomFilter};
use crate::codec::{self, Compressor, Lz4Compressor};
use crate::error::{FilterError, FilterKind, Mismatch, Result};
use crate::filter::FilterRef;
use crate::hash::hashers_agree;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The three generations of a rotating filter and the config they share.
#[derive(Debug, Clone)]
pub(crate) struct Generations {
    pub(crate) previous: BloomFilter,
    pub(crate) current: BloomFilter,
    pub(crate) next: BloomFilter,
    pub(crate) config: RotatingConfig,
}

impl Generations {
    /// `config` must already be valid.
    pub(crate) fn new(config: RotatingConfig) -> Self {
        let placeholder = BloomConfig::placeholder(config.bloom.hash_strategy);
        Self {
            previous: BloomFilter::build(placeholder),
            current: BloomFilter::build(config.bloom.clone()),
            next: BloomFilter::build(config.bloom.clone()),
            config,
        }
    }

    pub(crate) fn rotate(&mut self) {
        let fresh = BloomFilter::build(self.config.bloom.clone());
        let next = mem::replace(&mut self.next, fresh);
        self.previous = mem::replace(&mut self.current, next);
    }

    fn add(&self, item: &[u8]) {
        self.current.add(item);
        self.next.add(item);
    }

    fn check(&self, item: &[u8]) -> bool {
        self.previous.check(item) || self.current.check(item)
    }

    pub(crate) fn fill_ratio(&self) -> f64 {
        let [previous, current, next] = self.fill_ratios();
        (previous + current + next) / 3.0
    }

    fn fill_ratios(&self) -> [f64; 3] {
        [
            self.previous.fill_ratio(),
            self.current.fill_ratio(),
            self.next.fill_ratio(),
        ]
    }

    fn pairs<'a>(
        &'a self,
        theirs: &'a Generations,
    ) -> [(&'a BloomFilter, &'a BloomFilter); 3] {
        [
            (&self.previous, &theirs.previous),
            (&self.current, &theirs.current),
            (&self.next, &theirs.next),
        ]
    }

    /// Validates every pair before any bit is merged.
    fn union(&self, theirs: &Generations) -> Result<f64> {
        let ours_cfg = &self.config.bloom;
        let theirs_cfg = &theirs.config.bloom;
        if ours_cfg.capacity != theirs_cfg.capacity {
            return Err(FilterError::ConfigMismatch(Mismatch::Capacity {
                ours: ours_cfg.capacity,
                theirs: theirs_cfg.capacity,
            }));
        }
        if ours_cfg.false_positive_rate != theirs_cfg.false_positive_rate {
            return Err(FilterError::ConfigMismatch(
                Mismatch::FalsePositiveRate {
                    ours: ours_cfg.false_positive_rate,
                    theirs: theirs_cfg.false_positive_rate,
                },
            ));
        }

        // both strategies are evaluated at our k
        let k = self.next.num_hashes();
        if !hashers_agree(
            &ours_cfg.hash_strategy.hashers(k),
            &theirs_cfg.hash_strategy.hashers(k),
        ) {
            return Err(FilterError::HashIncompatible);
        }

        for (ours, theirs) in self.pairs(theirs) {
            ours.ensure_same_shape(theirs)?;
        }
        for (ours, theirs) in self.pairs(theirs) {
            ours.merge(theirs)?;
        }
        Ok(self.fill_ratio())
    }
}

/// Bloom filter with a sliding time window.
///
/// Items go into the `current` and `next` generations, lookups consult
/// `previous` and `current`. A background task rotates the generations once
/// per ttl, so an item stays visible for between two and three ttls.
///
/// The rotation task is spawned on the tokio runtime the filter is created
/// in and is stopped by [`close`](Self::close), by dropping the filter, or by
/// cancelling the scope passed to [`with_scope`](Self::with_scope).
#[derive(Debug)]
pub struct RotatingBloomFilter {
    state: Arc<RwLock<Generations>>,
    scope: CancellationToken,
    task: Mutex<Option<RotationTask>>,
}

impl RotatingBloomFilter {
    pub fn new(config: RotatingConfig) -> Result<Self> {
        Self::with_scope(config, &CancellationToken::new())
    }

    /// Binds the rotation task to `scope`.
    pub fn with_scope(
        config: RotatingConfig,
        scope: &CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        let runtime = current_runtime()?;
        let ttl = config.ttl;

        let state = Arc::new(RwLock::new(Generations::new(config)));
        let task =
            RotationTask::spawn(&runtime, Arc::clone(&state), scope, ttl);
        debug!(?ttl, "Created rotating bloom filter");

        Ok(Self {
            state,
            scope: scope.clone(),
            task: Mutex::new(Some(task)),
        })
    }

    /// Decodes an LZ4-compressed snapshot into a new running filter.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with(data, &Lz4Compressor)
    }

    pub fn from_bytes_with(
        data: &[u8],
        compressor: &dyn Compressor,
    ) -> Result<Self> {
        let scope = CancellationToken::new();
        Self::from_bytes_with_scope(data, compressor, &scope)
    }

    pub fn from_bytes_with_scope(
        data: &[u8],
        compressor: &dyn Compressor,
        scope: &CancellationToken,
    ) -> Result<Self> {
        let runtime = current_runtime()?;
        let generations = codec::decode_rotating(data, compressor)?;
        let ttl = generations.config.ttl;

        let state = Arc::new(RwLock::new(generations));
        let task =
            RotationTask::spawn(&runtime, Arc::clone(&state), scope, ttl);

        Ok(Self {
            state,
            scope: scope.clone(),
            task: Mutex::new(Some(task)),
        })
    }

    pub fn add(&self, item: &[u8]) -> Result<()> {
        self.read()?.add(item);
        Ok(())
    }

    pub fn check(&self, item: &[u8]) -> Result<bool> {
        Ok(self.read()?.check(item))
    }

    pub fn add_bulk(&self, items: &[&[u8]]) -> Result<()> {
        let generations = self.read()?;
        items.iter().for_each(|item| generations.add(item));
        Ok(())
    }

    pub fn check_bulk(&self, items: &[&[u8]]) -> Result<Vec<bool>> {
        let generations = self.read()?;
        Ok(items.iter().map(|item| generations.check(item)).collect())
    }

    /// Merges another rotating filter generation by generation and returns
    /// the mean fill ratio of the three generations.
    ///
    /// `other` is copied under its own read lock first, so two filters can
    /// union into each other concurrently. The receiver is only read-locked:
    /// merging sets bits atomically, and rotation waits for the union to
    /// finish. A failed union leaves the receiver untouched.
    pub fn union(&self, other: FilterRef<'_>) -> Result<f64> {
        let FilterRef::Rotating(other) = other else {
            return Err(FilterError::IncompatibleType {
                expected: FilterKind::Rotating,
                found: other.kind(),
            });
        };
        let theirs = other.read()?.clone();
        self.union_generations(&theirs)
    }

    /// Union with a serialized rotating filter, as received from a peer.
    pub fn union_encoded(&self, data: &[u8]) -> Result<f64> {
        if let Some(found @ FilterKind::Static) = codec::peek_kind(data) {
            return Err(FilterError::IncompatibleType {
                expected: FilterKind::Rotating,
                found,
            });
        }
        let theirs = codec::decode_rotating(data, &Lz4Compressor)?;
        self.union_generations(&theirs)
    }

    fn union_generations(&self, theirs: &Generations) -> Result<f64> {
        let result = self.read()?.union(theirs);
        match &result {
            Ok(fill_ratio) => debug!(fill_ratio, "Merged rotating filter"),
            Err(e) => warn!(error = %e, "Rejected rotating filter union"),
        }
        result
    }

    pub fn fill_ratio(&self) -> Result<f64> {
        Ok(self.read()?.fill_ratio())
    }

    /// Fill ratios of `previous`, `current` and `next`.
    pub fn generation_fill_ratios(&self) -> Result<[f64; 3]> {
        Ok(self.read()?.fill_ratios())
    }

    pub fn config(&self) -> Result<RotatingConfig> {
        Ok(self.read()?.config.clone())
    }

    /// `(m, k)` of the `current` generation.
    pub fn params(&self) -> Result<(usize, usize)> {
        let generations = self.read()?;
        Ok((generations.current.num_bits(), generations.current.num_hashes()))
    }

    pub fn marshal_binary(&self) -> Result<Vec<u8>> {
        self.marshal_binary_with(&Lz4Compressor)
    }

    pub fn marshal_binary_with(
        &self,
        compressor: &dyn Compressor,
    ) -> Result<Vec<u8>> {
        let generations = self.read()?;
        codec::encode_rotating(&generations, compressor)
    }

    pub fn unmarshal_binary(&self, data: &[u8]) -> Result<()> {
        self.unmarshal_binary_with(data, &Lz4Compressor)
    }

    /// Replaces the whole state with a decoded snapshot and restarts the
    /// rotation task with the decoded ttl.
    ///
    /// The snapshot is decoded and validated before the running task is
    /// touched, so a bad snapshot leaves the filter as it was.
    pub fn unmarshal_binary_with(
        &self,
        data: &[u8],
        compressor: &dyn Compressor,
    ) -> Result<()> {
        let runtime = current_runtime()?;
        let decoded = codec::decode_rotating(data, compressor)?;
        let ttl = decoded.config.ttl;

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        // cancel before taking the write lock, a rotation in flight
        // rechecks its token once it holds the lock
        if let Some(old) = task.take() {
            old.cancel();
        }
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = decoded;
        *task = Some(RotationTask::spawn(
            &runtime,
            Arc::clone(&self.state),
            &self.scope,
            ttl,
        ));

        info!(?ttl, "Restored rotating filter from snapshot");
        Ok(())
    }

    /// Stops the rotation task. Calling it again does nothing.
    pub fn close(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = task.take() {
            task.cancel();
            debug!("Stopped rotation task");
        }
    }

    pub fn is_rotating(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(RotationTask::is_running)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Generations>> {
        self.state.read().map_err(|_| {
            FilterError::LockError(
                "Failed to acquire read lock on generations".to_string(),
            )
        })
    }
}

impl Drop for RotatingBloomFilter {
    fn drop(&mut self) {
        self.close();
    }
}
