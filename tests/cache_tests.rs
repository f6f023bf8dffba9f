//! Concurrency tests for the render cache.
//!
//! Every test drives its callers with `tokio::join!` on a current-thread
//! runtime, so interleavings only happen at await points and are
//! deterministic.

use canvas_render::core::{CacheKey, CacheStats, RenderCache};
use canvas_render::RenderError;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

#[tokio::test]
async fn test_concurrent_requests_share_one_render() {
    let cache: RenderCache<String> = RenderCache::new();
    let key = CacheKey::from("formula");
    let calls = AtomicUsize::new(0);

    let render = || async {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok::<_, RenderError>("artifact".to_string())
    };

    let (a, b, c, d) = tokio::join!(
        cache.get_or_render(&key, render),
        cache.get_or_render(&key, render),
        cache.get_or_render(&key, render),
        cache.get_or_render(&key, render),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let a = a.unwrap();
    for other in [b, c, d] {
        assert!(std::sync::Arc::ptr_eq(&a, &other.unwrap()));
    }
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 0,
            joins: 3,
            misses: 1,
            failures: 0
        }
    );
}

#[tokio::test]
async fn test_pending_entry_is_invisible_to_peek() {
    let cache: RenderCache<u32> = RenderCache::new();
    let key = CacheKey::from("slow");
    let (release, gate) = oneshot::channel::<()>();

    let owner = cache.get_or_render(&key, || async move {
        gate.await.ok();
        Ok(7)
    });
    let observer = async {
        tokio::task::yield_now().await;
        assert!(cache.is_pending(&key));
        assert!(cache.peek(&key).is_none());
        assert!(!cache.has(&key));
        release.send(()).ok();
    };

    let (result, ()) = tokio::join!(owner, observer);
    assert_eq!(*result.unwrap(), 7);
    assert_eq!(cache.peek(&key).as_deref(), Some(&7));
    assert!(!cache.is_pending(&key));
}

#[tokio::test]
async fn test_failure_is_shared_and_not_stored() {
    let cache: RenderCache<String> = RenderCache::new();
    let key = CacheKey::from("broken");
    let calls = AtomicUsize::new(0);

    let failing = || async {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Err::<String, _>(RenderError::Backend("syntax error".into()))
    };
    let (first, second) = tokio::join!(
        cache.get_or_render(&key, failing),
        cache.get_or_render(&key, failing),
    );

    assert_eq!(first, Err(RenderError::Backend("syntax error".into())));
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.is_empty());

    // A later request retries.
    let retried = cache
        .get_or_render(&key, || async { Ok("fixed".to_string()) })
        .await
        .unwrap();
    assert_eq!(retried.as_str(), "fixed");
    assert_eq!(cache.stats().failures, 1);
}

#[tokio::test]
async fn test_invalidate_forces_new_render() {
    let cache: RenderCache<usize> = RenderCache::new();
    let key = CacheKey::from("k");
    let calls = AtomicUsize::new(0);
    let render = || async { Ok::<_, RenderError>(calls.fetch_add(1, Ordering::SeqCst)) };

    assert_eq!(*cache.get_or_render(&key, render).await.unwrap(), 0);
    assert_eq!(*cache.get_or_render(&key, render).await.unwrap(), 0);

    cache.invalidate(&key);
    assert!(!cache.has(&key));
    assert_eq!(*cache.get_or_render(&key, render).await.unwrap(), 1);
}

#[tokio::test]
async fn test_completion_after_invalidate_is_not_stored() {
    let cache: RenderCache<&'static str> = RenderCache::new();
    let key = CacheKey::from("stale");
    let (release, gate) = oneshot::channel::<()>();

    let stale = cache.get_or_render(&key, || async move {
        gate.await.ok();
        Ok("old")
    });
    let interloper = async {
        tokio::task::yield_now().await;
        cache.invalidate(&key);
        assert!(!cache.is_pending(&key));

        // A fresh request starts its own computation and stores it.
        let fresh = cache
            .get_or_render(&key, || async { Ok("new") })
            .await
            .unwrap();
        release.send(()).ok();
        fresh
    };

    let (old, fresh) = tokio::join!(stale, interloper);
    assert_eq!(*old.unwrap(), "old");
    assert_eq!(*fresh, "new");
    assert_eq!(cache.peek(&key).as_deref(), Some(&"new"));
}

#[tokio::test]
async fn test_abandoned_owner_releases_joiners() {
    let cache: RenderCache<u8> = RenderCache::new();
    let key = CacheKey::from("dropped");

    let owner = cache.get_or_render(&key, || std::future::pending());
    let joiner = async {
        tokio::task::yield_now().await;
        cache.get_or_render(&key, || async { Ok(1) }).await
    };

    // The owner never finishes; the timeout drops it while the joiner waits.
    let owner = tokio::time::timeout(std::time::Duration::from_millis(10), owner);
    let (timed_out, joined) = tokio::join!(owner, joiner);

    assert!(timed_out.is_err());
    assert_eq!(joined, Err(RenderError::Abandoned));
    assert!(!cache.is_pending(&key));

    let recovered = cache.get_or_render(&key, || async { Ok(2) }).await.unwrap();
    assert_eq!(*recovered, 2);
}

#[tokio::test]
async fn test_distinct_keys_render_independently() {
    let cache: RenderCache<String> = RenderCache::new();
    let keys: Vec<CacheKey> = ["a", "b", "c"].into_iter().map(CacheKey::from).collect();

    for key in &keys {
        let value = key.as_str().to_uppercase();
        cache
            .get_or_render(key, || async move { Ok(value) })
            .await
            .unwrap();
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.peek(&keys[1]).as_deref().map(String::as_str), Some("B"));
    cache.clear();
    assert!(cache.is_empty());
}
