use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(pub i64);

/// One published catalog item. Immutable once loaded into a snapshot; the
/// catalog is replaced wholesale on refresh, never patched item-by-item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    /// Price as reported by the source, kept as text for display.
    pub price: String,
    pub image_url: Option<String>,
    pub permalink: String,
}

impl Product {
    /// Lowercased name + category labels + tag labels, the haystack every
    /// scorer term is matched against.
    pub fn search_blob(&self) -> String {
        let mut blob = self.name.to_lowercase();
        for label in self.categories.iter().chain(self.tags.iter()) {
            blob.push(' ');
            blob.push_str(&label.to_lowercase());
        }
        blob
    }
}
