//! Dedup and resolution cache over a [`KnownStore`].
//!
//! Two check-and-record protocols share one store handle:
//!
//! - [`DedupCache::check_and_record`] - membership only. Answers "is this
//!   fingerprint new?" and records it on first sight.
//! - [`DedupCache::resolve`] - get-or-compute. Returns the cached derived value
//!   for a fingerprint, running the expensive computation only on a miss and
//!   caching its result only on success.
//!
//! Neither protocol is atomic across its two store calls. Two concurrent
//! first-sight requests for the same content may both be told "new" (dedup)
//! or may both compute and write (resolve, last write wins).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::error::{Result, SeenError};
use crate::fingerprint::Fingerprint;
use crate::store::{KnownStore, StoreError};

/// Default bound on a single store round-trip.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Store key names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    /// Set holding every fingerprint seen in dedup mode.
    pub known_set: String,
    /// Map from fingerprint to serialized derived payload.
    pub resolution_map: String,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self {
            known_set: "images".to_string(),
            resolution_map: "locations".to_string(),
        }
    }
}

pub struct DedupCache {
    store: Arc<dyn KnownStore>,
    keys: CacheKeys,
    op_timeout: Duration,
}

impl DedupCache {
    pub fn new(store: Arc<dyn KnownStore>) -> Self {
        Self {
            store,
            keys: CacheKeys::default(),
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_keys(mut self, keys: CacheKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn KnownStore> {
        &self.store
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> std::result::Result<T, StoreError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.op_timeout.as_millis() as u64;
                warn!(op, timeout_ms, "Store operation timed out");
                Err(StoreError::Timeout(timeout_ms))
            }
        }
    }

    /// Membership protocol. Returns `true` when `fp` had not been seen.
    ///
    /// A failed membership read is returned as an error. On a miss the add is
    /// best effort: its failure is logged and dropped, because the verdict is
    /// already decided. The only consequence is that the same content reads
    /// as new again on the next request.
    #[instrument(level = "debug", skip(self), fields(fingerprint = %fp))]
    pub async fn check_and_record(&self, fp: Fingerprint) -> Result<bool> {
        let key = fp.to_key();
        let set = &self.keys.known_set;

        let seen = self
            .bounded("is_member", self.store.is_member(set, &key))
            .await?;
        if seen {
            debug!("Fingerprint already known");
            return Ok(false);
        }

        match self
            .bounded("add_member", self.store.add_member(set, &key))
            .await
        {
            Ok(()) => debug!("Recorded new fingerprint"),
            Err(e) => warn!(
                error = %e,
                fingerprint = %fp,
                "Failed to record new fingerprint; it will be reported as new again"
            ),
        }

        Ok(true)
    }

    /// Resolution protocol. Returns the cached value for `fp`, or runs
    /// `compute` and caches its result.
    ///
    /// - A non-empty cached payload is decoded and returned; `compute` is not
    ///   called. A payload that fails to decode is a
    ///   [`SeenError::CacheCorrupt`] error and is left in place.
    /// - A missing or empty payload runs `compute`. Its error is returned and
    ///   nothing is written, so the next request retries.
    #[instrument(level = "debug", skip(self, compute), fields(fingerprint = %fp))]
    pub async fn resolve<T, F, Fut>(&self, fp: Fingerprint, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let key = fp.to_key();
        let map = &self.keys.resolution_map;

        let cached = self
            .bounded("get_field", self.store.get_field(map, &key))
            .await?;

        if let Some(payload) = cached.filter(|p| !p.is_empty()) {
            return serde_json::from_str(&payload).map_err(|e| {
                error!(
                    error = %e,
                    map = %map,
                    key = %key,
                    "Cached payload failed to decode; manual invalidation required"
                );
                SeenError::CacheCorrupt {
                    key: format!("{map}/{key}"),
                    reason: e.to_string(),
                }
            });
        }

        debug!("Cache miss, computing");
        let value = compute().await?;

        let payload =
            serde_json::to_string(&value).map_err(|e| SeenError::Serialization(e.to_string()))?;
        self.bounded("set_field", self.store.set_field(map, &key, &payload))
            .await?;
        debug!(bytes = payload.len(), "Cached computed payload");

        Ok(value)
    }
}

impl std::fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("backend", &self.store.backend_name())
            .field("keys", &self.keys)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::location::LocationRecord;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store with injectable failures and latency.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: bool,
        fail_writes: bool,
        read_delay: Option<Duration>,
        write_delay: Option<Duration>,
    }

    #[async_trait]
    impl KnownStore for FlakyStore {
        async fn is_member(&self, set: &str, member: &str) -> std::result::Result<bool, StoreError> {
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_reads {
                return Err(StoreError::Connection("connection refused".into()));
            }
            self.inner.is_member(set, member).await
        }

        async fn add_member(&self, set: &str, member: &str) -> std::result::Result<(), StoreError> {
            if let Some(delay) = self.write_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_writes {
                return Err(StoreError::Command("READONLY replica".into()));
            }
            self.inner.add_member(set, member).await
        }

        async fn get_field(
            &self,
            map: &str,
            field: &str,
        ) -> std::result::Result<Option<String>, StoreError> {
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_reads {
                return Err(StoreError::Connection("connection refused".into()));
            }
            self.inner.get_field(map, field).await
        }

        async fn set_field(
            &self,
            map: &str,
            field: &str,
            value: &str,
        ) -> std::result::Result<(), StoreError> {
            if let Some(delay) = self.write_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_writes {
                return Err(StoreError::Command("READONLY replica".into()));
            }
            self.inner.set_field(map, field, value).await
        }

        async fn ping(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    fn paris() -> LocationRecord {
        LocationRecord {
            city: Some("Paris".into()),
            country_code: Some("fr".into()),
            ..Default::default()
        }
    }

    // ==================== Membership protocol ====================

    #[tokio::test]
    async fn test_first_check_unique_then_known() {
        let cache = DedupCache::new(Arc::new(MemoryStore::new()));
        let fp = fingerprint(b"image A");

        assert!(cache.check_and_record(fp).await.unwrap());
        assert!(!cache.check_and_record(fp).await.unwrap());
        assert!(!cache.check_and_record(fp).await.unwrap());
    }

    #[tokio::test]
    async fn test_fingerprints_are_independent() {
        let cache = DedupCache::new(Arc::new(MemoryStore::new()));

        assert!(cache.check_and_record(fingerprint(b"a")).await.unwrap());
        assert!(cache.check_and_record(fingerprint(b"b")).await.unwrap());
        assert!(!cache.check_and_record(fingerprint(b"a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_records_under_configured_set_as_hex_key() {
        let store = Arc::new(MemoryStore::new());
        let cache = DedupCache::new(store.clone()).with_keys(CacheKeys {
            known_set: "uploads".into(),
            resolution_map: "geo".into(),
        });
        let fp = fingerprint(b"keyed");

        cache.check_and_record(fp).await.unwrap();

        assert!(store.is_member("uploads", &fp.to_key()).await.unwrap());
        assert_eq!(store.set_len("images"), 0);
    }

    #[tokio::test]
    async fn test_failed_add_is_swallowed() {
        let store = FlakyStore {
            fail_writes: true,
            ..Default::default()
        };
        let cache = DedupCache::new(Arc::new(store));
        let fp = fingerprint(b"unrecordable");

        assert!(cache.check_and_record(fp).await.unwrap());
        // never recorded, so still new
        assert!(cache.check_and_record(fp).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_membership_read_is_surfaced() {
        let store = FlakyStore {
            fail_reads: true,
            ..Default::default()
        };
        let cache = DedupCache::new(Arc::new(store));

        let err = cache
            .check_and_record(fingerprint(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, SeenError::Store(StoreError::Connection(_))));
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let store = FlakyStore {
            read_delay: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        let cache =
            DedupCache::new(Arc::new(store)).with_op_timeout(Duration::from_millis(20));

        let err = cache
            .check_and_record(fingerprint(b"slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, SeenError::Store(StoreError::Timeout(20))));
    }

    #[tokio::test]
    async fn test_timed_out_add_still_reports_unique() {
        let store = Arc::new(FlakyStore {
            write_delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let cache = DedupCache::new(store.clone()).with_op_timeout(Duration::from_millis(20));
        let fp = fingerprint(b"slow write");

        assert!(cache.check_and_record(fp).await.unwrap());
        // the add was cancelled at the timeout
        assert_eq!(store.inner.set_len("images"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_sight_may_both_be_unique() {
        // Both reads complete before either add lands.
        let store = FlakyStore {
            read_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let cache = DedupCache::new(Arc::new(store));
        let fp = fingerprint(b"raced");

        let (a, b) = tokio::join!(cache.check_and_record(fp), cache.check_and_record(fp));

        assert!(a.unwrap());
        assert!(b.unwrap());
        assert!(!cache.check_and_record(fp).await.unwrap());
    }

    // ==================== Resolution protocol ====================

    #[tokio::test]
    async fn test_resolve_computes_once_then_serves_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = DedupCache::new(store.clone());
        let fp = fingerprint(b"geotagged");
        let calls = AtomicUsize::new(0);

        let first = cache
            .resolve(fp, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(paris())
            })
            .await
            .unwrap();
        assert_eq!(first, paris());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.map_len("locations"), 1);

        let second: LocationRecord = cache
            .resolve(fp, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(LocationRecord::default())
            })
            .await
            .unwrap();
        assert_eq!(second, paris(), "cached value wins over the new computation");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_resolve_computes_twice_and_keeps_one_entry() {
        // Both reads miss before either write lands.
        let store = Arc::new(FlakyStore {
            read_delay: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let cache = DedupCache::new(store.clone());
        let fp = fingerprint(b"raced geotag");
        let calls = AtomicUsize::new(0);
        let compute = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(paris())
        };

        let (a, b) = tokio::join!(cache.resolve(fp, compute), cache.resolve(fp, compute));

        assert_eq!(a.unwrap(), paris());
        assert_eq!(b.unwrap(), paris());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.inner.map_len("locations"), 1);
    }

    #[tokio::test]
    async fn test_failed_compute_caches_nothing_and_retries() {
        let store = Arc::new(MemoryStore::new());
        let cache = DedupCache::new(store.clone());
        let fp = fingerprint(b"no gps");
        let calls = AtomicUsize::new(0);

        let err = cache
            .resolve(fp, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<LocationRecord, _>(SeenError::NoCoordinates)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SeenError::NoCoordinates));
        assert_eq!(store.map_len("locations"), 0);

        let retried = cache
            .resolve(fp, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(paris())
            })
            .await
            .unwrap();
        assert_eq!(retried, paris());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_payload_fails_without_recompute() {
        let store = Arc::new(MemoryStore::new());
        let fp = fingerprint(b"corrupted");
        store
            .set_field("locations", &fp.to_key(), "{not json")
            .await
            .unwrap();
        let cache = DedupCache::new(store.clone());
        let calls = AtomicUsize::new(0);

        let err = cache
            .resolve(fp, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(paris())
            })
            .await
            .unwrap_err();

        match err {
            SeenError::CacheCorrupt { key, .. } => {
                assert_eq!(key, format!("locations/{}", fp.to_key()))
            }
            other => panic!("expected CacheCorrupt, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            store
                .get_field("locations", &fp.to_key())
                .await
                .unwrap()
                .as_deref(),
            Some("{not json"),
            "corrupt entry is left for an operator to inspect"
        );
    }

    #[tokio::test]
    async fn test_empty_payload_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let fp = fingerprint(b"empty entry");
        store.set_field("locations", &fp.to_key(), "").await.unwrap();
        let cache = DedupCache::new(store.clone());

        let value = cache.resolve(fp, || async { Ok(paris()) }).await.unwrap();

        assert_eq!(value, paris());
        let stored = store.get_field("locations", &fp.to_key()).await.unwrap();
        assert!(stored.is_some_and(|p| p.contains("Paris")));
    }

    #[tokio::test]
    async fn test_resolve_store_failure_skips_compute() {
        let store = FlakyStore {
            fail_reads: true,
            ..Default::default()
        };
        let cache = DedupCache::new(Arc::new(store));
        let calls = AtomicUsize::new(0);

        let result = cache
            .resolve(fingerprint(b"x"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(paris())
            })
            .await;

        assert!(matches!(result, Err(SeenError::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_write_failure_is_surfaced() {
        let store = FlakyStore {
            fail_writes: true,
            ..Default::default()
        };
        let cache = DedupCache::new(Arc::new(store));

        let result = cache.resolve(fingerprint(b"x"), || async { Ok(paris()) }).await;
        assert!(matches!(
            result,
            Err(SeenError::Store(StoreError::Command(_)))
        ));
    }
}
