use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::warn;

use crate::catalog::TourCatalog;

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_on: NaiveDate,
    locations: Vec<String>,
}

/// Day-keyed cache of the destination vocabulary fed into the extraction
/// prompt. Refreshed when stale for the current day; a concurrent double
/// refresh is benign (the vocabulary is eventually-consistent reference
/// data, last write wins). Fetch failures degrade to an empty vocabulary
/// and are not cached, so the next turn retries.
#[derive(Default)]
pub struct LocationCache {
    inner: RwLock<Option<CacheEntry>>,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn vocabulary_for(&self, catalog: &dyn TourCatalog, today: NaiveDate) -> Vec<String> {
        {
            let guard = self.inner.read().await;
            if let Some(entry) = guard.as_ref()
                && entry.fetched_on == today
            {
                return entry.locations.clone();
            }
        }

        match catalog.available_locations().await {
            Ok(locations) => {
                let mut guard = self.inner.write().await;
                *guard = Some(CacheEntry {
                    fetched_on: today,
                    locations: locations.clone(),
                });
                locations
            }
            Err(err) => {
                warn!("location vocabulary fetch failed, degrading to empty: {err}");
                Vec::new()
            }
        }
    }

    pub async fn invalidate(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;

    use super::LocationCache;
    use crate::catalog::{
        CatalogError, CatalogFuture, SearchPredicates, TourCatalog, TourRecord,
    };

    struct CountingCatalog {
        fetches: AtomicUsize,
        fail: bool,
    }

    impl CountingCatalog {
        fn new(fail: bool) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl TourCatalog for CountingCatalog {
        fn search_tours<'a>(
            &'a self,
            _predicates: &'a SearchPredicates,
        ) -> CatalogFuture<'a, Vec<TourRecord>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn tour_by_id(&self, _tour_id: i64) -> CatalogFuture<'_, Option<TourRecord>> {
            Box::pin(async { Ok(None) })
        }

        fn available_locations(&self) -> CatalogFuture<'_, Vec<String>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(CatalogError::Backend("connection refused".to_string()))
                } else {
                    Ok(vec!["Đà Nẵng".to_string(), "Phú Quốc".to_string()])
                }
            })
        }
    }

    fn day(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date")
    }

    #[tokio::test]
    async fn second_read_on_same_day_does_not_refetch() {
        let cache = LocationCache::new();
        let catalog = CountingCatalog::new(false);

        let first = cache.vocabulary_for(&catalog, day(1)).await;
        let second = cache.vocabulary_for(&catalog, day(1)).await;

        assert_eq!(first, second);
        assert_eq!(catalog.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_day_triggers_refresh() {
        let cache = LocationCache::new();
        let catalog = CountingCatalog::new(false);

        cache.vocabulary_for(&catalog, day(1)).await;
        cache.vocabulary_for(&catalog, day(2)).await;

        assert_eq!(catalog.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = LocationCache::new();
        let catalog = CountingCatalog::new(false);

        cache.vocabulary_for(&catalog, day(1)).await;
        cache.invalidate().await;
        cache.vocabulary_for(&catalog, day(1)).await;

        assert_eq!(catalog.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_empty_without_caching() {
        let cache = LocationCache::new();
        let failing = CountingCatalog::new(true);

        let vocabulary = cache.vocabulary_for(&failing, day(1)).await;
        assert!(vocabulary.is_empty());

        // The failure must not be cached as today's vocabulary.
        let retry = cache.vocabulary_for(&failing, day(1)).await;
        assert!(retry.is_empty());
        assert_eq!(failing.fetches.load(Ordering::SeqCst), 2);
    }
}
