//! Collaborator traits at the system boundary. Implementations live in the
//! catalog and db crates; the core and agent only ever see these seams.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::product::Product;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("product source request failed: {0}")]
    Transport(String),
    #[error("product source returned a malformed payload: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProductFilter {
    None,
    Category(i64),
    Tag(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub per_page: u32,
    pub filter: ProductFilter,
}

impl PageQuery {
    pub fn unfiltered(page: u32, per_page: u32) -> Self {
        Self { page, per_page, filter: ProductFilter::None }
    }
}

/// Paged listing of published products from the external store. Callers treat
/// failures as soft: an errored fetch degrades to an empty page.
#[async_trait]
pub trait ProductSource: Send + Sync {
    async fn fetch_page(&self, query: PageQuery) -> Result<Vec<Product>, SourceError>;

    /// Popularity-ordered listing used for best-seller detection.
    async fn fetch_most_popular(&self, limit: u32) -> Result<Vec<Product>, SourceError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage failure: {0}")]
    Unavailable(String),
}

/// Append-only lead sink. Insertion is rejected when the digit-normalized
/// phone already exists or the number fails local-format validation.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Returns `true` when a new lead record was stored.
    async fn save_lead(&self, name: &str, phone: &str, context: &str)
        -> Result<bool, StorageError>;
}

#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn append(
        &self,
        session_id: &str,
        user_message: &str,
        bot_response: &str,
        has_products: bool,
    ) -> Result<(), StorageError>;
}
