//! Duplicate-suppressing job creation
//!
//! A record is created at most once per fingerprint, ever. Checks run from
//! cheapest to most authoritative: the in-process fingerprint set, a count
//! query, and finally the store's unique constraint, whose violation is
//! treated as "duplicate, skipped".
//!
//! The fingerprint set is unbounded unless `scheduler.dedup_cache_capacity`
//! is set, in which case the least recently used entries are evicted. An
//! evicted fingerprint only costs one extra count query.

use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;
use tracing::debug;

use super::types::NewJob;
use crate::database::repositories::JobRecordSeaOrmRepository;
use crate::errors::RepositoryResult;

enum FingerprintSet {
    Unbounded(HashSet<String>),
    Bounded(LruCache<String, ()>),
}

impl FingerprintSet {
    fn contains(&mut self, fingerprint: &str) -> bool {
        match self {
            FingerprintSet::Unbounded(set) => set.contains(fingerprint),
            FingerprintSet::Bounded(cache) => cache.get(fingerprint).is_some(),
        }
    }

    fn insert(&mut self, fingerprint: String) {
        match self {
            FingerprintSet::Unbounded(set) => {
                set.insert(fingerprint);
            }
            FingerprintSet::Bounded(cache) => {
                cache.put(fingerprint, ());
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            FingerprintSet::Unbounded(set) => set.len(),
            FingerprintSet::Bounded(cache) => cache.len(),
        }
    }
}

pub struct JobCreator {
    repository: JobRecordSeaOrmRepository,
    recent: Mutex<FingerprintSet>,
}

impl JobCreator {
    pub fn new(repository: JobRecordSeaOrmRepository, capacity: Option<usize>) -> Self {
        let recent = match capacity.and_then(NonZeroUsize::new) {
            Some(capacity) => FingerprintSet::Bounded(LruCache::new(capacity)),
            None => FingerprintSet::Unbounded(HashSet::new()),
        };
        Self {
            repository,
            recent: Mutex::new(recent),
        }
    }

    /// Create a NEW record unless its fingerprint was ever submitted before.
    /// Returns `Ok(true)` when created and `Ok(false)` when skipped.
    pub async fn create(&self, job: NewJob) -> RepositoryResult<bool> {
        let fingerprint = job.fingerprint();

        if self.recent.lock().await.contains(&fingerprint) {
            debug!("Skipping duplicate {} (recently created): {}", job.job_type, fingerprint);
            return Ok(false);
        }

        if self.repository.count_by_fingerprint(&fingerprint).await? > 0 {
            debug!("Skipping duplicate {} (already stored): {}", job.job_type, fingerprint);
            self.recent.lock().await.insert(fingerprint);
            return Ok(false);
        }

        match self.repository.insert(&job).await {
            Ok(record) => {
                debug!(
                    "Created {} (priority {}, depth {:?}, by {})",
                    record, record.priority, record.depth, record.created_by
                );
                self.recent.lock().await.insert(fingerprint);
                Ok(true)
            }
            Err(e) if e.is_unique_violation() => {
                debug!("Skipping duplicate {} (concurrent insert): {}", job.job_type, fingerprint);
                self.recent.lock().await.insert(fingerprint);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Number of fingerprints currently held in memory
    pub async fn cache_len(&self) -> usize {
        self.recent.lock().await.len()
    }
}
