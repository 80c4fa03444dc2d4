//! In-memory catalog snapshot. The whole catalog is paged in from the
//! remote source up front and swapped atomically, so user turns only ever
//! read a consistent snapshot and never wait on the store API.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use galleria_core::domain::product::{Product, ProductId};
use galleria_core::ports::{PageQuery, ProductSource, SourceError};

/// How many popularity-ranked items feed the best-seller bonus set.
const BEST_SELLER_POOL: u32 = 20;
/// How many best-seller names are surfaced to the model prompt.
const BEST_SELLER_NAMES: usize = 5;

#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    pub products: Vec<Product>,
    pub best_seller_ids: HashSet<ProductId>,
    pub best_seller_names: Vec<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub product_count: usize,
    pub best_seller_count: usize,
    /// True when the bulk fetch stopped early on a transport error and the
    /// snapshot holds only the pages fetched before it.
    pub partial: bool,
}

pub struct CatalogStore {
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    catalog_cap: usize,
    refresh_page_size: u32,
}

impl CatalogStore {
    pub fn new(catalog_cap: usize, refresh_page_size: u32) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
            catalog_cap,
            refresh_page_size,
        }
    }

    /// Current snapshot; cheap to clone and safe to hold across a turn.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Page the full catalog in from `source` and swap the snapshot.
    ///
    /// A transport error mid-way keeps whatever was fetched so far; an error
    /// before any page arrived leaves the previous snapshot untouched and is
    /// reported to the caller.
    pub async fn refresh(&self, source: &dyn ProductSource) -> Result<RefreshOutcome, SourceError> {
        let mut products: Vec<Product> = Vec::new();
        let mut seen_ids: HashSet<ProductId> = HashSet::new();
        let mut partial = false;
        let mut page = 1u32;

        loop {
            if products.len() >= self.catalog_cap {
                break;
            }

            let query = PageQuery::unfiltered(page, self.refresh_page_size);
            let batch = match source.fetch_page(query).await {
                Ok(batch) => batch,
                Err(error) if !products.is_empty() => {
                    warn!(
                        event_name = "catalog.refresh.partial",
                        page,
                        fetched = products.len(),
                        error = %error,
                    );
                    partial = true;
                    break;
                }
                Err(error) => return Err(error),
            };

            if batch.is_empty() {
                break;
            }

            for product in batch {
                if products.len() >= self.catalog_cap {
                    break;
                }
                if seen_ids.insert(product.id) {
                    products.push(product);
                }
            }

            page += 1;
        }

        let (best_seller_ids, best_seller_names) = match source
            .fetch_most_popular(BEST_SELLER_POOL)
            .await
        {
            Ok(popular) => {
                let names = popular
                    .iter()
                    .take(BEST_SELLER_NAMES)
                    .map(|product| product.name.clone())
                    .collect();
                let ids = popular.into_iter().map(|product| product.id).collect();
                (ids, names)
            }
            Err(error) => {
                // Best sellers are a scoring bonus, not a requirement.
                warn!(event_name = "catalog.refresh.best_sellers_failed", error = %error);
                (HashSet::new(), Vec::new())
            }
        };

        let outcome = RefreshOutcome {
            product_count: products.len(),
            best_seller_count: best_seller_ids.len(),
            partial,
        };

        let next = Arc::new(CatalogSnapshot {
            products,
            best_seller_ids,
            best_seller_names,
            refreshed_at: Some(Utc::now()),
        });
        *self.snapshot.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = next;

        info!(
            event_name = "catalog.refresh.completed",
            products = outcome.product_count,
            best_sellers = outcome.best_seller_count,
            partial = outcome.partial,
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use galleria_core::domain::product::{Product, ProductId};
    use galleria_core::ports::{PageQuery, ProductSource, SourceError};

    use super::{CatalogStore, BEST_SELLER_NAMES};

    fn product(id: i64, name: &str) -> Product {
        Product {
            id: ProductId(id),
            name: name.to_string(),
            categories: Vec::new(),
            tags: Vec::new(),
            price: "199".to_string(),
            image_url: None,
            permalink: format!("https://shop.example/p/{id}"),
        }
    }

    /// Serves `pages` in order, then empty pages; optionally fails from a
    /// given page onwards.
    struct ScriptedSource {
        pages: Vec<Vec<Product>>,
        popular: Result<Vec<Product>, SourceError>,
        fail_from_page: Option<u32>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Vec<Product>>, popular: Vec<Product>) -> Self {
            Self { pages, popular: Ok(popular), fail_from_page: None, calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl ProductSource for ScriptedSource {
        async fn fetch_page(&self, query: PageQuery) -> Result<Vec<Product>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(fail_from) = self.fail_from_page {
                if query.page >= fail_from {
                    return Err(SourceError::Transport("connection reset".to_string()));
                }
            }
            Ok(self.pages.get((query.page - 1) as usize).cloned().unwrap_or_default())
        }

        async fn fetch_most_popular(&self, _limit: u32) -> Result<Vec<Product>, SourceError> {
            match &self.popular {
                Ok(products) => Ok(products.clone()),
                Err(_) => Err(SourceError::Transport("popularity unavailable".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn refresh_pages_until_an_empty_page() {
        let source = ScriptedSource::new(
            vec![
                vec![product(1, "א"), product(2, "ב")],
                vec![product(3, "ג")],
            ],
            Vec::new(),
        );
        let store = CatalogStore::new(2000, 2);

        let outcome = match store.refresh(&source).await {
            Ok(outcome) => outcome,
            Err(error) => panic!("refresh should succeed: {error}"),
        };

        assert_eq!(outcome.product_count, 3);
        assert!(!outcome.partial);
        assert_eq!(store.snapshot().products.len(), 3);
    }

    #[tokio::test]
    async fn refresh_stops_at_the_catalog_cap() {
        let source = ScriptedSource::new(
            vec![
                vec![product(1, "א"), product(2, "ב")],
                vec![product(3, "ג"), product(4, "ד")],
                vec![product(5, "ה"), product(6, "ו")],
            ],
            Vec::new(),
        );
        let store = CatalogStore::new(3, 2);

        let outcome = match store.refresh(&source).await {
            Ok(outcome) => outcome,
            Err(error) => panic!("refresh should succeed: {error}"),
        };

        assert_eq!(outcome.product_count, 3);
    }

    #[tokio::test]
    async fn duplicate_ids_across_pages_are_dropped() {
        let source = ScriptedSource::new(
            vec![
                vec![product(1, "א"), product(2, "ב")],
                vec![product(2, "ב שוב"), product(3, "ג")],
            ],
            Vec::new(),
        );
        let store = CatalogStore::new(2000, 2);

        let outcome = match store.refresh(&source).await {
            Ok(outcome) => outcome,
            Err(error) => panic!("refresh should succeed: {error}"),
        };

        assert_eq!(outcome.product_count, 3);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.products[1].name, "ב");
    }

    #[tokio::test]
    async fn mid_refresh_error_keeps_the_fetched_prefix() {
        let mut source = ScriptedSource::new(
            vec![vec![product(1, "א"), product(2, "ב")]],
            Vec::new(),
        );
        source.fail_from_page = Some(2);
        let store = CatalogStore::new(2000, 2);

        let outcome = match store.refresh(&source).await {
            Ok(outcome) => outcome,
            Err(error) => panic!("partial refresh should still succeed: {error}"),
        };

        assert!(outcome.partial);
        assert_eq!(outcome.product_count, 2);
    }

    #[tokio::test]
    async fn first_page_error_leaves_the_old_snapshot_in_place() {
        let seed = ScriptedSource::new(vec![vec![product(1, "א")]], Vec::new());
        let store = CatalogStore::new(2000, 2);
        if let Err(error) = store.refresh(&seed).await {
            panic!("seed refresh should succeed: {error}");
        }

        let mut failing = ScriptedSource::new(Vec::new(), Vec::new());
        failing.fail_from_page = Some(1);

        assert!(store.refresh(&failing).await.is_err());
        assert_eq!(store.snapshot().products.len(), 1);
    }

    #[tokio::test]
    async fn best_sellers_feed_ids_and_a_short_name_list() {
        let popular: Vec<Product> =
            (1..=8).map(|id| product(id, &format!("רב מכר {id}"))).collect();
        let source = ScriptedSource::new(vec![vec![product(100, "רגיל")]], popular);
        let store = CatalogStore::new(2000, 2);

        let outcome = match store.refresh(&source).await {
            Ok(outcome) => outcome,
            Err(error) => panic!("refresh should succeed: {error}"),
        };

        assert_eq!(outcome.best_seller_count, 8);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.best_seller_names.len(), BEST_SELLER_NAMES);
        assert!(snapshot.best_seller_ids.contains(&ProductId(3)));
    }

    #[tokio::test]
    async fn popularity_failure_degrades_to_no_best_sellers() {
        let mut source = ScriptedSource::new(vec![vec![product(1, "א")]], Vec::new());
        source.popular = Err(SourceError::Transport("down".to_string()));
        let store = CatalogStore::new(2000, 2);

        let outcome = match store.refresh(&source).await {
            Ok(outcome) => outcome,
            Err(error) => panic!("refresh should succeed: {error}"),
        };

        assert_eq!(outcome.best_seller_count, 0);
        assert!(store.snapshot().best_seller_names.is_empty());
    }
}
