use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

use crate::error::ApiError;

/// Ordered tuple of string segments, e.g. `["modules", "<cohort_id>"]`.
pub type CacheKey = Vec<String>;

type FetchResult = Result<Arc<Value>, ApiError>;

/// Shared read-through cache over query results.
///
/// Contracts:
/// - concurrent readers of one key share a single in-flight fetch;
/// - `invalidate_prefix` forces a refetch on the next read of every key
///   starting with the prefix;
/// - a response issued before an invalidation of the same key is never
///   stored (last-request-wins);
/// - a failed fetch surfaces the error and leaves the prior value intact;
/// - a fetch whose caller is cancelled mid-flight is taken over by the
///   next reader of the key, never inherited as a permanent error.
#[derive(Default)]
pub struct QueryCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

#[derive(Default)]
struct Slot {
    /// Bumped by every invalidation touching this key.
    version: u64,
    /// Last stored value, tagged with the version it was fetched under.
    value: Option<(u64, Arc<Value>)>,
    /// In-flight fetch started under the tagged version, if any.
    inflight: Option<(u64, watch::Receiver<Option<FetchResult>>)>,
}

enum Plan {
    Hit(Arc<Value>),
    Join(watch::Receiver<Option<FetchResult>>),
    Fetch(u64, watch::Sender<Option<FetchResult>>),
}

impl QueryCache {
    pub fn key<I, S>(parts: I) -> CacheKey
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        parts.into_iter().map(Into::into).collect()
    }

    /// Return the cached value for `key`, joining or starting a fetch as
    /// needed. `fetch` runs at most once per cache miss across all
    /// concurrent callers.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, ApiError>>,
    {
        // A key with an empty scope segment means a missing foreign key;
        // never issue a fetch for it.
        if key.iter().any(|s| s.is_empty()) {
            return Err(ApiError::Validation("missing scope id".into()));
        }

        let mut fetch = Some(fetch);
        loop {
            let plan = {
                let mut slots = self.slots.lock().expect("cache lock poisoned");
                let slot = slots.entry(key.clone()).or_default();
                match &slot.value {
                    Some((fetched_at, value)) if *fetched_at == slot.version => {
                        Plan::Hit(value.clone())
                    }
                    _ => Self::start_or_join(slot),
                }
            };

            match plan {
                Plan::Hit(value) => return Ok(value),
                Plan::Join(mut rx) => loop {
                    if let Some(result) = rx.borrow_and_update().clone() {
                        return result;
                    }
                    if rx.changed().await.is_err() {
                        // The fetching caller was dropped before publishing
                        // (request cancelled mid-fetch). Clear the dead
                        // entry and take over the fetch ourselves.
                        let mut slots = self.slots.lock().expect("cache lock poisoned");
                        if let Some(slot) = slots.get_mut(&key) {
                            if matches!(&slot.inflight, Some((_, stored)) if stored.same_channel(&rx))
                            {
                                slot.inflight = None;
                            }
                        }
                        break;
                    }
                },
                Plan::Fetch(started, tx) => {
                    debug!(key = ?key, "cache miss, fetching");
                    let fetch = fetch.take().expect("fetch runs at most once");
                    let fetched = fetch().await;
                    let result = {
                        let mut slots = self.slots.lock().expect("cache lock poisoned");
                        let slot = slots.entry(key).or_default();
                        let result = match fetched {
                            Ok(value) => {
                                let value = Arc::new(value);
                                // Only store if no invalidation raced this fetch.
                                if slot.version == started {
                                    slot.value = Some((started, value.clone()));
                                }
                                Ok(value)
                            }
                            Err(e) => Err(e),
                        };
                        if matches!(&slot.inflight, Some((v, _)) if *v == started) {
                            slot.inflight = None;
                        }
                        result
                    };
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    fn start_or_join(slot: &mut Slot) -> Plan {
        if let Some((version, rx)) = &slot.inflight {
            if *version == slot.version {
                return Plan::Join(rx.clone());
            }
        }
        let (tx, rx) = watch::channel(None);
        slot.inflight = Some((slot.version, rx));
        Plan::Fetch(slot.version, tx)
    }

    /// Mark every key starting with `prefix` as stale. Stale values are
    /// retained for error fallback but never served as current.
    pub fn invalidate_prefix(&self, prefix: &[&str]) {
        let mut slots = self.slots.lock().expect("cache lock poisoned");
        for (key, slot) in slots.iter_mut() {
            if key.len() >= prefix.len() && key.iter().zip(prefix).all(|(a, b)| a == b) {
                slot.version += 1;
            }
        }
        debug!(prefix = ?prefix, "cache invalidated");
    }

    /// Last known value regardless of staleness.
    pub fn peek(&self, key: &[String]) -> Option<Arc<Value>> {
        let slots = self.slots.lock().expect("cache lock poisoned");
        slots.get(key).and_then(|s| s.value.as_ref().map(|(_, v)| v.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn k(parts: &[&str]) -> CacheKey {
        QueryCache::key(parts.iter().copied())
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = QueryCache::default();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let v = cache
                .get_or_fetch(k(&["cohorts"]), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!([{"name": "C1"}]))
                })
                .await
                .unwrap();
            assert_eq!(v[0]["name"], "C1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_readers_share_one_fetch() {
        let cache = Arc::new(QueryCache::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let fetcher = |cache: Arc<QueryCache>, calls: Arc<AtomicUsize>| async move {
            cache
                .get_or_fetch(k(&["modules", "c1"]), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(json!(["m1"]))
                })
                .await
        };

        let (a, b) = tokio::join!(
            fetcher(cache.clone(), calls.clone()),
            fetcher(cache.clone(), calls.clone())
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let cache = QueryCache::default();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let read = |n: u64| {
            cache.get_or_fetch(k(&["modules", "c1"]), move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(json!(n)) }
            })
        };

        assert_eq!(*read(1).await.unwrap(), json!(1));
        cache.invalidate_prefix(&["modules"]);
        assert_eq!(*read(2).await.unwrap(), json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn prefix_invalidation_spares_other_families() {
        let cache = QueryCache::default();
        let calls = AtomicUsize::new(0);

        for key in [k(&["modules", "c1"]), k(&["progress", "s1"])] {
            cache
                .get_or_fetch(key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(json!([])) }
                })
                .await
                .unwrap();
        }
        cache.invalidate_prefix(&["modules"]);
        cache
            .get_or_fetch(k(&["progress", "s1"]), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!([])) }
            })
            .await
            .unwrap();
        // progress was untouched by the modules invalidation
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_value() {
        let cache = QueryCache::default();
        let key = k(&["students"]);

        cache
            .get_or_fetch(key.clone(), || async { Ok(json!(["ana"])) })
            .await
            .unwrap();
        cache.invalidate_prefix(&["students"]);

        let err = cache
            .get_or_fetch(key.clone(), || async {
                Err(ApiError::Database("connection reset".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Database(_)));
        assert_eq!(*cache.peek(&key).unwrap(), json!(["ana"]));
    }

    #[tokio::test]
    async fn response_issued_before_invalidation_is_not_stored() {
        let cache = Arc::new(QueryCache::default());
        let key = k(&["submissions", "a1"]);

        let slow = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(key, || async {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(json!("stale"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.invalidate_prefix(&["submissions"]);
        slow.await.unwrap().unwrap();

        // The stale response must not satisfy a post-invalidation read.
        let fresh = cache
            .get_or_fetch(key, || async { Ok(json!("fresh")) })
            .await
            .unwrap();
        assert_eq!(*fresh, json!("fresh"));
    }

    #[tokio::test]
    async fn abandoned_fetch_does_not_freeze_the_key() {
        let cache = Arc::new(QueryCache::default());
        let key = k(&["assignments"]);

        // A caller that disconnects mid-fetch drops its future without
        // ever publishing a result.
        let abandoned = {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(key, || async {
                        tokio::time::sleep(Duration::from_millis(60)).await;
                        Ok(json!("never published"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        abandoned.abort();
        assert!(abandoned.await.is_err());

        // Later readers take the fetch over instead of inheriting the
        // dead in-flight entry, and caching resumes as normal.
        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            let v = cache
                .get_or_fetch(key.clone(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("recovered"))
                })
                .await
                .unwrap();
            assert_eq!(*v, json!("recovered"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parent_prefix_invalidation_covers_scoped_keys() {
        let cache = QueryCache::default();
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        let key = k(&["students", "s1"]);

        let read = || {
            cache.get_or_fetch(key.clone(), move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({"completed_lessons": 1})) }
            })
        };
        read().await.unwrap();
        read().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Invalidating the family root stales every scoped key under it,
        // so mutations elsewhere that change embedded counts may rely on
        // the parent prefix alone.
        cache.invalidate_prefix(&["students"]);
        read().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_scope_segment_never_fetches() {
        let cache = QueryCache::default();
        let calls = AtomicUsize::new(0);

        let err = cache
            .get_or_fetch(k(&["modules", ""]), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!([])) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
