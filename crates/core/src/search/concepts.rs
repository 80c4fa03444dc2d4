//! Immutable vocabulary maps injected at startup: mood/style concepts that
//! broaden a query, and exact category/tag names that fast-path to a
//! server-side filtered fetch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ports::ProductFilter;

/// Mapping from an abstract concept term to the concrete catalog vocabulary
/// it should pull in during scoring.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMap {
    entries: HashMap<String, Vec<String>>,
}

impl ConceptMap {
    pub fn new(entries: HashMap<String, Vec<String>>) -> Self {
        Self { entries }
    }

    /// The store's stock concept vocabulary.
    pub fn hebrew_defaults() -> Self {
        let entries = [
            (
                "צבעוני",
                vec![
                    "פופ ארט", "גרפיטי", "אבסטרקט", "סטריט ארט", "צבעוני", "קולאז", "street art",
                    "pop art", "צבעים", "שמח", "צבע", "colorful",
                ],
            ),
            ("שמח", vec!["פופ ארט", "חיות", "צבעוני", "חיוך", "קוף", "אופטימי"]),
            (
                "רגוע",
                vec![
                    "נוף", "ים", "חוף", "שקיעה", "בז", "פסטל", "מינימליזם", "סקנדינבי", "שקט",
                    "טבע", "בוהו", "boho", "calm",
                ],
            ),
            ("סולידי", vec!["שחור לבן", "מינימליזם", "גיאומטרי", "נקי", "קלאסי"]),
            (
                "יוקרתי",
                vec![
                    "שחור וזהב", "מותגים", "זכוכית", "rolex", "gucci", "זהב", "יוקרה", "יוקרתי",
                    "luxury", "black and gold",
                ],
            ),
            ("סלון", vec!["אבסטרקט", "נוף", "גדול", "סט", "שלושה חלקים", "סלון", "living room"]),
            ("חיות", vec!["חיות", "animals", "wildlife", "טבע"]),
            (
                "ילדים",
                vec![
                    "אנימה", "חיות", "ספורט", "גיבורי על", "דיסני", "spiderman", "batman",
                    "ילדים", "נוער", "kids",
                ],
            ),
            (
                "אנימה",
                vec![
                    "אנימה", "anime", "מנגה", "דרגון בול", "נארוטו", "וואן פיס", "dragon ball",
                    "naruto", "one piece",
                ],
            ),
        ];

        Self {
            entries: entries
                .into_iter()
                .map(|(concept, synonyms)| {
                    (concept.to_string(), synonyms.into_iter().map(str::to_string).collect())
                })
                .collect(),
        }
    }

    /// Synonyms of every concept whose key appears as a substring of the
    /// normalized query. Overlapping concepts contribute independently.
    pub fn expansion_terms(&self, normalized_query: &str) -> Vec<String> {
        let mut terms = Vec::new();
        for (concept, synonyms) in &self.entries {
            if normalized_query.contains(concept.as_str()) {
                terms.extend(synonyms.iter().cloned());
            }
        }
        terms
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Exact category/tag display name to the source's numeric identifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierMap {
    #[serde(default)]
    categories: HashMap<String, i64>,
    #[serde(default)]
    tags: HashMap<String, i64>,
}

impl IdentifierMap {
    pub fn new(categories: HashMap<String, i64>, tags: HashMap<String, i64>) -> Self {
        Self { categories, tags }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Category match wins over a tag match when a name exists in both maps.
    pub fn lookup(&self, query: &str) -> Option<ProductFilter> {
        if let Some(id) = self.categories.get(query) {
            return Some(ProductFilter::Category(*id));
        }
        self.tags.get(query).map(|id| ProductFilter::Tag(*id))
    }

    pub fn category_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.categories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn tag_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::ports::ProductFilter;

    use super::{ConceptMap, IdentifierMap};

    #[test]
    fn expansion_collects_synonyms_of_every_matching_concept() {
        let concepts = ConceptMap::hebrew_defaults();
        let terms = concepts.expansion_terms("משהו צבעוני ושמח לסלון");

        assert!(terms.iter().any(|t| t == "פופ ארט"));
        assert!(terms.iter().any(|t| t == "אבסטרקט"));
        assert!(terms.iter().any(|t| t == "אופטימי"));
    }

    #[test]
    fn expansion_is_empty_when_no_concept_matches() {
        let concepts = ConceptMap::hebrew_defaults();
        assert!(concepts.expansion_terms("משהו אחר לגמרי").is_empty());
    }

    #[test]
    fn lookup_prefers_category_over_tag() {
        let identifiers = IdentifierMap::new(
            HashMap::from([("חיות".to_string(), 11)]),
            HashMap::from([("חיות".to_string(), 42), ("אנימה".to_string(), 17)]),
        );

        assert_eq!(identifiers.lookup("חיות"), Some(ProductFilter::Category(11)));
        assert_eq!(identifiers.lookup("אנימה"), Some(ProductFilter::Tag(17)));
        assert_eq!(identifiers.lookup("נוף"), None);
    }

    #[test]
    fn identifier_map_loads_from_json() {
        let raw = r#"{"categories": {"חיות": 11}, "tags": {"אנימה": 17}}"#;
        let identifiers = IdentifierMap::from_json(raw).expect("valid mapping json");

        assert_eq!(identifiers.lookup("חיות"), Some(ProductFilter::Category(11)));
        assert_eq!(identifiers.category_names(), vec!["חיות"]);
        assert_eq!(identifiers.tag_names(), vec!["אנימה"]);
    }
}
