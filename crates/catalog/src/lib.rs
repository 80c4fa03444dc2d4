//! Catalog access for the discovery assistant: a remote product source
//! backed by the store's REST API and an in-memory snapshot refreshed in
//! bulk so search never pages the remote API per user turn.

pub mod source;
pub mod store;

pub use source::HttpProductSource;
pub use store::{CatalogSnapshot, CatalogStore, RefreshOutcome};
