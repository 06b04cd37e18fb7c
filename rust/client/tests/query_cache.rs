// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cache behaviour against counting fetchers.

use bimfm_client::{FetchStatus, Query, QueryCache, QueryKey, TransportError, DEFAULT_GRACE_PERIOD};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A query whose value is the number of fetches performed so far.
fn counting(key: QueryKey, calls: &Arc<AtomicUsize>, delay: Duration) -> Query<usize> {
    let calls = Arc::clone(calls);
    Query::new(key, move || {
        let calls = Arc::clone(&calls);
        async move {
            tokio::time::sleep(delay).await;
            Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
        }
    })
}

#[tokio::test]
async fn test_concurrent_fetches_share_one_request() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let query = counting(QueryKey::new("assets"), &calls, Duration::from_millis(50));

    let results = futures::future::join_all((0..5).map(|_| cache.fetch(&query))).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(*result.unwrap(), 1);
    }
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_read_does_not_block() {
    let cache = QueryCache::with_stale_time(DEFAULT_GRACE_PERIOD, Duration::from_secs(3600));
    let calls = Arc::new(AtomicUsize::new(0));
    let query = counting(QueryKey::new("ifc_files"), &calls, Duration::from_millis(20));

    let first = cache.read(&query);
    assert!(first.is_loading());
    assert!(first.data.is_none());

    cache.fetch(&query).await.unwrap();
    let second = cache.read(&query);
    assert_eq!(second.status, FetchStatus::Success);
    assert_eq!(second.data.as_deref(), Some(&1));
    assert!(!second.stale);
    assert!(second.fetched_at.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fresh_value_is_served_without_refetch() {
    let cache = QueryCache::with_stale_time(DEFAULT_GRACE_PERIOD, Duration::from_secs(3600));
    let calls = Arc::new(AtomicUsize::new(0));
    let query = counting(QueryKey::new("assets"), &calls, Duration::ZERO);

    assert_eq!(*cache.fetch(&query).await.unwrap(), 1);
    assert_eq!(*cache.fetch(&query).await.unwrap(), 1);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_aged_value_is_refreshed_in_background() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let query = counting(QueryKey::new("assets"), &calls, Duration::from_millis(10));

    assert_eq!(*cache.fetch(&query).await.unwrap(), 1);

    // Served from the cache at once; the refresh lands afterwards.
    assert_eq!(*cache.fetch(&query).await.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*cache.fetch(&query).await.unwrap(), 2);
}

#[tokio::test]
async fn test_invalidate_without_subscriber_refetches_on_next_read() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("inspections");
    let query = counting(key.clone(), &calls, Duration::from_millis(10));

    cache.fetch(&query).await.unwrap();
    cache.invalidate(&key);

    // No observer: nothing is refetched yet.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The stale value is still served while the refresh runs.
    let stale = cache.read(&query);
    assert!(stale.stale);
    assert_eq!(stale.data.as_deref(), Some(&1));

    assert_eq!(*cache.fetch(&query).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidate_with_subscriber_refetches_immediately() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("asset").param("id", 2);
    let query = counting(key.clone(), &calls, Duration::from_millis(10));

    let mut subscription = cache.subscribe(&query);
    assert_eq!(cache.subscriber_count(&key), 1);
    loop {
        let entry = subscription.changed().await.unwrap();
        if entry.status == FetchStatus::Success {
            break;
        }
    }

    cache.invalidate(&key);
    let refreshed = loop {
        let entry = subscription.changed().await.unwrap();
        if entry.status == FetchStatus::Success && !entry.stale {
            break entry;
        }
    };
    assert_eq!(refreshed.data.as_deref(), Some(&2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    drop(subscription);
    assert_eq!(cache.subscriber_count(&key), 0);
}

#[tokio::test]
async fn test_invalidate_resource_matches_every_param_set() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let all = counting(QueryKey::new("assets"), &calls, Duration::ZERO);
    let critical = counting(
        QueryKey::new("assets").param("condition_status", "Critical"),
        &calls,
        Duration::ZERO,
    );
    let other = counting(QueryKey::new("ifc_files"), &calls, Duration::ZERO);

    cache.fetch(&all).await.unwrap();
    cache.fetch(&critical).await.unwrap();
    cache.fetch(&other).await.unwrap();
    cache.invalidate_resource("assets");

    assert!(cache.read(&all).stale);
    assert!(cache.read(&critical).stale);
    assert!(!cache.read(&other).stale);
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_value() {
    let cache = QueryCache::default();
    let key = QueryKey::new("asset_statistics").param("id", 1);
    let fail = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&fail);
    let query = Query::new(key.clone(), move || {
        let fail = flag.load(Ordering::SeqCst);
        async move {
            if fail {
                Err(TransportError::new(Some(500), "Internal Server Error"))
            } else {
                Ok(7u64)
            }
        }
    });

    assert_eq!(*cache.fetch(&query).await.unwrap(), 7);
    fail.store(true, Ordering::SeqCst);
    cache.invalidate(&key);

    let err = cache.fetch(&query).await.unwrap_err();
    assert_eq!(err.status, Some(500));
    assert_eq!(cache.status(&key), Some(FetchStatus::Error));
    assert_eq!(cache.read(&query).data.as_deref(), Some(&7));
}

#[tokio::test]
async fn test_value_of_another_type_is_a_miss() {
    let cache = QueryCache::default();
    let key = QueryKey::new("ifc_file").param("id", 1);
    let number = Query::new(key.clone(), || async { Ok::<_, TransportError>(1u32) });
    let text = Query::new(key.clone(), || async { Ok::<_, TransportError>("model.ifc".to_string()) });

    cache.fetch(&number).await.unwrap();
    assert!(cache.read(&text).data.is_none());
    assert_eq!(cache.fetch(&text).await.unwrap().as_str(), "model.ifc");
}

#[tokio::test]
async fn test_dependent_query_runs_only_when_enabled() {
    let cache = QueryCache::default();
    let with_file = Query::new(QueryKey::new("asset").param("id", 1), || async {
        Ok::<_, TransportError>(Some(9i64))
    });
    let without_file = Query::new(QueryKey::new("asset").param("id", 2), || async {
        Ok::<_, TransportError>(None::<i64>)
    });
    let file_query = |file_id: &Option<i64>| {
        file_id.map(|id| {
            Query::new(QueryKey::new("ifc_file").param("id", id), move || async move {
                Ok::<_, TransportError>(format!("file-{}", id))
            })
        })
    };

    let enabled = cache.fetch_dependent(&with_file, file_query).await.unwrap();
    assert_eq!(*enabled.parent, Some(9));
    assert_eq!(enabled.child.unwrap().unwrap().as_str(), "file-9");

    let disabled = cache.fetch_dependent(&without_file, file_query).await.unwrap();
    assert!(disabled.child.is_none());
    // Two parents and the single enabled child.
    assert_eq!(cache.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unobserved_entry_is_evicted_after_grace() {
    let grace = Duration::from_secs(300);
    let cache = QueryCache::new(grace);
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("inspections");
    let query = counting(key.clone(), &calls, Duration::ZERO);

    cache.fetch(&query).await.unwrap();
    assert!(cache.contains(&key));

    tokio::time::sleep(grace / 2).await;
    assert!(cache.contains(&key));

    tokio::time::sleep(grace).await;
    assert!(!cache.contains(&key));
}

#[tokio::test(start_paused = true)]
async fn test_observed_entry_is_kept() {
    let grace = Duration::from_secs(300);
    let cache = QueryCache::new(grace);
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::new("assets");
    let query = counting(key.clone(), &calls, Duration::ZERO);

    let subscription = cache.subscribe(&query);
    tokio::time::sleep(grace * 3).await;
    assert!(cache.contains(&key));

    drop(subscription);
    tokio::time::sleep(grace + Duration::from_secs(1)).await;
    assert!(!cache.contains(&key));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
