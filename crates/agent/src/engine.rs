//! Search resolution: turns a directive query plus per-session state into the
//! next batch of unseen candidates. Pagination advances an explicit, bounded
//! cursor; a query whose current page is fully seen moves on to the next page
//! instead of repeating results.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use galleria_core::directive::CONTINUATION_TOKENS;
use galleria_core::domain::product::Product;
use galleria_core::domain::session::SessionState;
use galleria_core::ports::{PageQuery, ProductSource};
use galleria_core::search::concepts::{ConceptMap, IdentifierMap};
use galleria_core::search::scorer::RelevanceScorer;
use galleria_catalog::CatalogStore;

/// Query words that carry no search signal on their own.
const STOP_WORDS: &[&str] =
    &["משהו", "כזה", "בשביל", "של", "את", "על", "עם", "תמונה", "תמונות", "ציור"];

pub struct SearchEngine {
    source: Arc<dyn ProductSource>,
    catalog: Arc<CatalogStore>,
    concepts: ConceptMap,
    identifiers: Arc<IdentifierMap>,
    scorer: RelevanceScorer,
    page_size: u32,
    max_page_depth: u32,
    sample_size: usize,
    rng: Mutex<StdRng>,
}

impl SearchEngine {
    pub fn new(
        source: Arc<dyn ProductSource>,
        catalog: Arc<CatalogStore>,
        concepts: ConceptMap,
        identifiers: Arc<IdentifierMap>,
        page_size: u32,
        max_page_depth: u32,
        sample_size: usize,
    ) -> Self {
        Self {
            source,
            catalog,
            concepts,
            identifiers,
            scorer: RelevanceScorer::new(),
            page_size,
            max_page_depth,
            sample_size,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sampling for tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Resolve `query` against the session's cursor and seen-set, advancing
    /// both. Empty output means the catalog is exhausted for this query (or
    /// the page depth bound was hit), never that a page merely repeated.
    pub async fn resolve(&self, session: &mut SessionState, query: &str) -> Vec<Product> {
        loop {
            if session.page > self.max_page_depth {
                debug!(event_name = "search.resolve.depth_exhausted", page = session.page);
                return Vec::new();
            }

            let fetched = self.fetch_candidates(query, session.page).await;
            if fetched.is_empty() {
                return Vec::new();
            }

            let fresh: Vec<Product> =
                fetched.into_iter().filter(|product| !session.seen.contains(&product.id)).collect();

            if fresh.is_empty() {
                session.page += 1;
                continue;
            }

            session.page += 1;
            session.mark_seen(fresh.iter().map(|product| &product.id));
            debug!(
                event_name = "search.resolve.batch",
                page = session.page - 1,
                returned = fresh.len(),
            );
            return fresh;
        }
    }

    /// One page of candidates for `query`, before seen-filtering.
    async fn fetch_candidates(&self, query: &str, page: u32) -> Vec<Product> {
        // Exact category/tag names skip scoring entirely and page the source
        // with a server-side filter.
        if let Some(filter) = self.identifiers.lookup(query) {
            let page_query = PageQuery { page, per_page: self.page_size, filter };
            match self.source.fetch_page(page_query).await {
                Ok(products) if !products.is_empty() => return products,
                Ok(_) => {}
                Err(error) => {
                    warn!(event_name = "search.identifier_fetch_failed", error = %error);
                }
            }
        }

        let stripped: Vec<&str> = query
            .split_whitespace()
            .filter(|word| !STOP_WORDS.contains(word))
            .collect();
        let effective = if stripped.is_empty() { query.to_string() } else { stripped.join(" ") };

        let snapshot = self.catalog.snapshot();

        // A bare "more" request gets a fresh broad sample, never a page slice:
        // each turn re-samples and the seen-filter upstream drops repeats, so
        // an advanced cursor cannot strand unseen products.
        if is_continuation_token(&effective) {
            let amount = self.sample_size.min(snapshot.products.len());
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            return snapshot.products.choose_multiple(&mut *rng, amount).cloned().collect();
        }

        let candidates = self.scorer.rank(
            &effective,
            &snapshot.products,
            &self.concepts,
            &snapshot.best_seller_ids,
        );

        let start = ((page - 1) * self.page_size) as usize;
        candidates.into_iter().skip(start).take(self.page_size as usize).collect()
    }
}

fn is_continuation_token(query: &str) -> bool {
    let upper = query.trim().to_uppercase();
    CONTINUATION_TOKENS.iter().any(|token| upper == *token)
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    use async_trait::async_trait;

    use galleria_core::domain::product::{Product, ProductId};
    use galleria_core::domain::session::SessionState;
    use galleria_core::ports::{PageQuery, ProductFilter, ProductSource, SourceError};
    use galleria_core::search::concepts::{ConceptMap, IdentifierMap};
    use galleria_catalog::CatalogStore;

    use super::SearchEngine;

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

    /// Serves a fixed catalog page-by-page, and separate pages for filtered
    /// category/tag fetches.
    struct FixtureSource {
        catalog: Vec<Product>,
        filtered: Vec<Product>,
        fail_filtered: bool,
    }

    #[async_trait]
    impl ProductSource for FixtureSource {
        async fn fetch_page(&self, query: PageQuery) -> Result<Vec<Product>, SourceError> {
            let pool = match query.filter {
                ProductFilter::None => &self.catalog,
                ProductFilter::Category(_) | ProductFilter::Tag(_) => {
                    if self.fail_filtered {
                        return Err(SourceError::Transport("filter endpoint down".to_string()));
                    }
                    &self.filtered
                }
            };
            let start = ((query.page - 1) * query.per_page) as usize;
            Ok(pool.iter().skip(start).take(query.per_page as usize).cloned().collect())
        }

        async fn fetch_most_popular(&self, _limit: u32) -> Result<Vec<Product>, SourceError> {
            Ok(Vec::new())
        }
    }

    async fn engine_with(
        source: FixtureSource,
        identifiers: IdentifierMap,
        page_size: u32,
    ) -> SearchEngine {
        let source = Arc::new(source);
        let catalog = Arc::new(CatalogStore::new(2000, 100));
        if let Err(error) = catalog.refresh(source.as_ref()).await {
            panic!("fixture refresh should succeed: {error}");
        }
        SearchEngine::new(
            source,
            catalog,
            ConceptMap::hebrew_defaults(),
            Arc::new(identifiers),
            page_size,
            10,
            60,
        )
        .with_seed(7)
    }

    #[tokio::test]
    async fn identifier_query_uses_the_filtered_fetch() {
        let source = FixtureSource {
            catalog: vec![product(1, "לא קשור")],
            filtered: vec![product(10, "הדפס אנימה")],
            fail_filtered: false,
        };
        let identifiers =
            IdentifierMap::new(HashMap::from([("אנימה".to_string(), 17)]), HashMap::new());
        let engine = engine_with(source, identifiers, 12).await;
        let mut session = SessionState::new();

        let batch = engine.resolve(&mut session, "אנימה").await;

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, ProductId(10));
    }

    #[tokio::test]
    async fn failed_identifier_fetch_falls_back_to_scoring() {
        let source = FixtureSource {
            catalog: vec![product(1, "הדפס אנימה דגם 1")],
            filtered: Vec::new(),
            fail_filtered: true,
        };
        let identifiers =
            IdentifierMap::new(HashMap::from([("אנימה".to_string(), 17)]), HashMap::new());
        let engine = engine_with(source, identifiers, 12).await;
        let mut session = SessionState::new();

        let batch = engine.resolve(&mut session, "אנימה").await;

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, ProductId(1));
    }

    #[tokio::test]
    async fn fully_seen_page_advances_to_the_next_page() {
        let catalog: Vec<Product> =
            (1..=4).map(|id| product(id, &format!("חיות דגם {id}"))).collect();
        let source = FixtureSource { catalog, filtered: Vec::new(), fail_filtered: false };
        let engine = engine_with(source, IdentifierMap::default(), 2).await;

        let mut session = SessionState::new();
        session.reset_for_query("חיות");
        let first = engine.resolve(&mut session, "חיות").await;
        assert_eq!(first.len(), 2);

        // Rewind the cursor as a continuation would not; the seen-set must
        // still prevent repeats by pushing to the next page.
        session.page = 1;
        let second = engine.resolve(&mut session, "חיות").await;

        assert_eq!(second.len(), 2);
        let first_ids: Vec<ProductId> = first.iter().map(|p| p.id).collect();
        assert!(second.iter().all(|p| !first_ids.contains(&p.id)));
    }

    #[tokio::test]
    async fn exhausted_results_return_empty() {
        let source = FixtureSource {
            catalog: vec![product(1, "חיות דגם 1")],
            filtered: Vec::new(),
            fail_filtered: false,
        };
        let engine = engine_with(source, IdentifierMap::default(), 12).await;
        let mut session = SessionState::new();
        session.reset_for_query("חיות");

        assert_eq!(engine.resolve(&mut session, "חיות").await.len(), 1);
        assert!(engine.resolve(&mut session, "חיות").await.is_empty());
    }

    #[tokio::test]
    async fn page_depth_is_bounded() {
        let source = FixtureSource {
            catalog: vec![product(1, "חיות דגם 1")],
            filtered: Vec::new(),
            fail_filtered: false,
        };
        let engine = engine_with(source, IdentifierMap::default(), 12).await;
        let mut session = SessionState::new();
        session.page = 11;

        assert!(engine.resolve(&mut session, "חיות").await.is_empty());
        assert_eq!(session.page, 11);
    }

    #[tokio::test]
    async fn continuation_token_samples_the_catalog() {
        let catalog: Vec<Product> =
            (1..=100).map(|id| product(id, &format!("דגם {id}"))).collect();
        let source = FixtureSource { catalog, filtered: Vec::new(), fail_filtered: false };
        let engine = engine_with(source, IdentifierMap::default(), 12).await;
        let mut session = SessionState::new();

        let batch = engine.resolve(&mut session, "עוד").await;

        // The whole bounded sample comes back, not one page of it.
        assert_eq!(batch.len(), 60);
        let ids: HashSet<ProductId> = batch.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 60);
    }

    #[tokio::test]
    async fn continuation_is_not_starved_by_an_advanced_cursor() {
        let catalog: Vec<Product> =
            (1..=60).map(|id| product(id, &format!("דגם {id}"))).collect();
        let source = FixtureSource { catalog, filtered: Vec::new(), fail_filtered: false };
        let engine = engine_with(source, IdentifierMap::default(), 12).await;
        let mut session = SessionState::new();
        // Five earlier turns' worth of cursor; the sample must ignore it.
        session.page = 6;

        let batch = engine.resolve(&mut session, "עוד").await;

        assert_eq!(batch.len(), 60);
    }

    #[tokio::test]
    async fn repeated_continuation_reaches_the_whole_catalog() {
        let catalog: Vec<Product> =
            (1..=60).map(|id| product(id, &format!("דגם {id}"))).collect();
        let source = FixtureSource { catalog, filtered: Vec::new(), fail_filtered: false };
        let engine = engine_with(source, IdentifierMap::default(), 12).await;
        let mut session = SessionState::new();

        let first = engine.resolve(&mut session, "עוד").await;

        assert_eq!(first.len(), 60);
        assert_eq!(session.seen.len(), 60);
        // Every product has now been shown; the next request is genuine
        // exhaustion, not a stranded slice.
        assert!(engine.resolve(&mut session, "עוד").await.is_empty());
    }

    #[tokio::test]
    async fn stop_words_are_stripped_before_scoring() {
        let source = FixtureSource {
            catalog: vec![product(1, "תמונת חיות ספארי")],
            filtered: Vec::new(),
            fail_filtered: false,
        };
        let engine = engine_with(source, IdentifierMap::default(), 12).await;
        let mut session = SessionState::new();

        // Without stripping, "תמונה של" would dilute the match into a failed
        // multi-term query.
        let batch = engine.resolve(&mut session, "תמונה של חיות").await;

        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn all_stop_word_query_falls_back_to_the_raw_text() {
        let source = FixtureSource {
            catalog: vec![product(1, "תמונה כללית")],
            filtered: Vec::new(),
            fail_filtered: false,
        };
        let engine = engine_with(source, IdentifierMap::default(), 12).await;
        let mut session = SessionState::new();

        let batch = engine.resolve(&mut session, "תמונה").await;

        assert_eq!(batch.len(), 1);
    }
}
