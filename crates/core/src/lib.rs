pub mod config;
pub mod directive;
pub mod domain;
pub mod errors;
pub mod lead;
pub mod ports;
pub mod render;
pub mod search;

pub use directive::{Directive, ParsedReply};
pub use domain::product::{Product, ProductId};
pub use domain::session::{SessionHandle, SessionState, SessionStore};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use ports::{
    ConversationLog, LeadStore, PageQuery, ProductFilter, ProductSource, SourceError, StorageError,
};
pub use search::concepts::{ConceptMap, IdentifierMap};
pub use search::diversify::{pick_display_set, PresentationFormat};
pub use search::scorer::{RelevanceScorer, ScoreWeights};
