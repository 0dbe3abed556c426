use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::{TreeIndex, TreeNode};
use crate::errors::AppResult;

/// Process-wide slot for a built tree index.
///
/// The index is rebuilt lazily on the first read after `invalidate`, or once
/// it is older than the configured max age. Only the tree structure is cached;
/// permission decisions are always recomputed.
pub struct TreeCache<N: TreeNode> {
    slot: RwLock<Option<Cached<N>>>,
    enabled: bool,
    max_age: Option<Duration>,
}

struct Cached<N: TreeNode> {
    index: Arc<TreeIndex<N>>,
    built_at: Instant,
}

impl<N: TreeNode> Cached<N> {
    fn fresh(&self, max_age: Option<Duration>) -> Option<Arc<TreeIndex<N>>> {
        match max_age {
            Some(max_age) if self.built_at.elapsed() >= max_age => None,
            _ => Some(Arc::clone(&self.index)),
        }
    }
}

impl<N: TreeNode> TreeCache<N> {
    pub fn new(enabled: bool) -> Self {
        Self {
            slot: RwLock::new(None),
            enabled,
            max_age: None,
        }
    }

    /// Rebuild on the next read once the cached index is `max_age` old.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub async fn get_or_build<F, Fut>(&self, load: F) -> AppResult<Arc<TreeIndex<N>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Vec<N>>>,
    {
        if !self.enabled {
            return Ok(Arc::new(TreeIndex::build(load().await?)?));
        }

        if let Some(index) = self.slot.read().await.as_ref().and_then(|c| c.fresh(self.max_age)) {
            return Ok(index);
        }

        let mut slot = self.slot.write().await;
        // Another task may have filled the slot while we waited for the lock.
        if let Some(index) = slot.as_ref().and_then(|c| c.fresh(self.max_age)) {
            return Ok(index);
        }

        let index = match TreeIndex::build(load().await?) {
            Ok(index) => Arc::new(index),
            Err(err) => {
                tracing::warn!(error = %err, "tree build failed; nothing cached");
                return Err(err.into());
            }
        };
        tracing::debug!(nodes = index.len(), "tree index cached");
        *slot = Some(Cached {
            index: Arc::clone(&index),
            built_at: Instant::now(),
        });
        Ok(index)
    }

    pub async fn invalidate(&self) {
        if self.slot.write().await.take().is_some() {
            tracing::info!("tree cache invalidated");
        }
    }

    pub async fn is_warm(&self) -> bool {
        self.slot
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.fresh(self.max_age).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    struct Leaf(i64);

    impl TreeNode for Leaf {
        type Id = i64;

        fn id(&self) -> i64 {
            self.0
        }

        fn parent_id(&self) -> Option<i64> {
            None
        }

        fn sort_order(&self) -> i64 {
            0
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_cache_reuses_until_invalidated() {
        let cache = TreeCache::<Leaf>::new(true);
        let counter = AtomicUsize::new(0);
        let loads = &counter;
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(vec![Leaf(1), Leaf(2)])
        };

        assert_eq!(cache.get_or_build(load).await.unwrap().len(), 2);
        assert_eq!(cache.get_or_build(load).await.unwrap().len(), 2);
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.invalidate().await;
        assert!(!cache.is_warm().await);
        cache.get_or_build(load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_loads() {
        let cache = TreeCache::<Leaf>::new(false);
        let counter = AtomicUsize::new(0);
        let loads = &counter;
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(vec![Leaf(1)])
        };

        cache.get_or_build(load).await.unwrap();
        cache.get_or_build(load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert!(!cache.is_warm().await);
    }

    #[tokio::test]
    async fn test_expired_index_is_rebuilt() {
        let cache = TreeCache::<Leaf>::new(true).with_max_age(Duration::from_millis(20));
        let counter = AtomicUsize::new(0);
        let loads = &counter;
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(vec![Leaf(1)])
        };

        cache.get_or_build(load).await.unwrap();
        cache.get_or_build(load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!cache.is_warm().await);
        cache.get_or_build(load).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_build_is_not_cached() {
        #[derive(Debug, Clone)]
        struct Orphan;

        impl TreeNode for Orphan {
            type Id = i64;

            fn id(&self) -> i64 {
                7
            }

            fn parent_id(&self) -> Option<i64> {
                Some(8)
            }

            fn sort_order(&self) -> i64 {
                0
            }

            fn is_enabled(&self) -> bool {
                true
            }
        }

        let cache = TreeCache::<Orphan>::new(true);
        let err = cache
            .get_or_build(|| async { Ok::<_, AppError>(vec![Orphan]) })
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::StructuralIntegrity(_)));
        assert!(!cache.is_warm().await);
    }
}
