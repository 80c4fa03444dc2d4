//! The conversation agent: prompt assembly, the language-model seam, the
//! search-resolution engine, and the per-turn runtime that ties them to the
//! session store and persistence.

pub mod engine;
pub mod llm;
pub mod prompt;
pub mod runtime;

pub use engine::SearchEngine;
pub use llm::{ChatMessage, LlmClient, OpenAiChatClient};
pub use prompt::HistoryTurn;
pub use runtime::{ChatRequest, ChatResponse, ChatRuntime};
