//! Heuristic relevance scoring of catalog items against a cleaned free-text
//! query. Best-effort term/substring matching, not an information-retrieval
//! engine: no index, no learned weights.

use std::collections::HashSet;

use crate::domain::product::{Product, ProductId};
use crate::search::concepts::ConceptMap;

/// Fixed score increments. Name matches dominate category/tag matches, and a
/// full multi-term match outranks any partial combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreWeights {
    /// Per concept-expansion term found in the searchable blob.
    pub concept_hit: i64,
    /// Extra credit when a query term appears in the product name itself.
    pub name_hit: i64,
    /// Per matched query term, when not all terms matched.
    pub term_hit: i64,
    /// Flat bonus when every query term matched and there were at least two.
    pub full_match: i64,
    /// Flat bonus for known best-sellers.
    pub best_seller: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { concept_hit: 10, name_hit: 30, term_hit: 20, full_match: 150, best_seller: 10 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RelevanceScorer {
    weights: ScoreWeights,
}

impl RelevanceScorer {
    pub fn new() -> Self {
        Self { weights: ScoreWeights::default() }
    }

    pub fn with_weights(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Lowercase, strip quote characters, trim.
    pub fn normalize_query(query: &str) -> String {
        query.to_lowercase().replace(['"', '\'', '`'], "").trim().to_string()
    }

    /// Rank the full catalog against `query`. Zero-score products are
    /// discarded; ties keep catalog order. Pagination is the caller's job.
    pub fn rank(
        &self,
        query: &str,
        catalog: &[Product],
        concepts: &ConceptMap,
        best_sellers: &HashSet<ProductId>,
    ) -> Vec<Product> {
        if catalog.is_empty() {
            return Vec::new();
        }

        let clean_query = Self::normalize_query(query);
        let terms: Vec<&str> =
            clean_query.split_whitespace().filter(|term| term.chars().count() >= 2).collect();
        let expansion = concepts.expansion_terms(&clean_query);

        let mut scored: Vec<(i64, &Product)> = Vec::new();
        for product in catalog {
            let blob = product.search_blob();
            let name = product.name.to_lowercase();
            let mut score = 0i64;

            for term in &expansion {
                if blob.contains(term.as_str()) {
                    score += self.weights.concept_hit;
                }
            }

            let mut matched = 0usize;
            for term in &terms {
                if blob.contains(term) {
                    matched += 1;
                    if name.contains(term) {
                        score += self.weights.name_hit;
                    }
                }
            }
            if matched > 0 {
                if matched == terms.len() && terms.len() > 1 {
                    score += self.weights.full_match;
                } else {
                    score += matched as i64 * self.weights.term_hit;
                }
            }

            if score > 0 {
                if best_sellers.contains(&product.id) {
                    score += self.weights.best_seller;
                }
                scored.push((score, product));
            }
        }

        // sort_by is stable, so equal scores keep catalog order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, product)| product.clone()).collect()
    }
}
