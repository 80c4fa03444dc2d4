//! Per-turn orchestration: guard the inbound message, consult the model,
//! act on its directives, and render the outcome. One turn holds its
//! session's lock from first read to last write.

use std::sync::Arc;

use tracing::{info, warn};

use galleria_core::directive::{is_continuation, parse_reply};
use galleria_core::domain::session::SessionStore;
use galleria_core::errors::{ApplicationError, DomainError};
use galleria_core::lead::find_phone;
use galleria_core::ports::{ConversationLog, LeadStore};
use galleria_core::render::{render_product_grid, render_reply, replies};
use galleria_core::search::concepts::IdentifierMap;
use galleria_core::search::diversify::pick_display_set;
use galleria_catalog::CatalogStore;

use crate::engine::SearchEngine;
use crate::llm::LlmClient;
use crate::prompt::{build_messages, HistoryTurn};

pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub history: Vec<HistoryTurn>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatResponse {
    pub reply: String,
    pub has_products: bool,
}

pub struct ChatRuntime {
    llm: Arc<dyn LlmClient>,
    engine: SearchEngine,
    sessions: Arc<SessionStore>,
    leads: Arc<dyn LeadStore>,
    log: Arc<dyn ConversationLog>,
    catalog: Arc<CatalogStore>,
    identifiers: Arc<IdentifierMap>,
    max_message_len: usize,
    history_window: usize,
    display_limit: usize,
}

impl ChatRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        engine: SearchEngine,
        sessions: Arc<SessionStore>,
        leads: Arc<dyn LeadStore>,
        log: Arc<dyn ConversationLog>,
        catalog: Arc<CatalogStore>,
        identifiers: Arc<IdentifierMap>,
        max_message_len: usize,
        history_window: usize,
        display_limit: usize,
    ) -> Self {
        Self {
            llm,
            engine,
            sessions,
            leads,
            log,
            catalog,
            identifiers,
            max_message_len,
            history_window,
            display_limit,
        }
    }

    pub async fn handle_message(
        &self,
        request: ChatRequest,
    ) -> Result<ChatResponse, ApplicationError> {
        if request.session_id.trim().is_empty() {
            return Err(DomainError::MissingSessionId.into());
        }
        if request.message.chars().count() > self.max_message_len {
            // Rejected before any model call or state mutation.
            return Ok(ChatResponse {
                reply: replies::TOO_LONG.to_string(),
                has_products: false,
            });
        }

        let handle = self.sessions.get_or_create(&request.session_id);
        let mut session = handle.lock().await;

        if let Some(phone) = find_phone(&request.message) {
            self.save_lead("User (Direct)", &phone, &request.message).await;
        }

        let snapshot = self.catalog.snapshot();
        let messages = build_messages(
            &self.identifiers,
            &snapshot,
            &request.history,
            &request.message,
            self.history_window,
        );

        // Session state is untouched so far; an oracle failure leaves the
        // cursor and seen-set exactly as the previous turn left them.
        let raw_reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(|error| ApplicationError::Oracle(error.to_string()))?;

        let parsed = parse_reply(&raw_reply, &request.message);

        if let Some(phone) = parsed.lead_phone() {
            self.save_lead("User (AI)", phone, &request.message).await;
        }

        let response = match parsed.search_query() {
            Some(raw_query) => {
                let mut query = raw_query.to_string();
                if is_continuation(&query) {
                    if let Some(last) = session.last_query.clone() {
                        query = last;
                    } else {
                        // Opening a session with "more": the token itself
                        // becomes the query context for later turns.
                        session.last_query = Some(query.clone());
                    }
                } else if session.last_query.as_deref() != Some(query.as_str()) {
                    session.reset_for_query(&query);
                }

                let resolved = self.engine.resolve(&mut session, &query).await;
                if resolved.is_empty() {
                    ChatResponse { reply: replies::no_results(&query), has_products: false }
                } else {
                    let display = pick_display_set(&resolved, self.display_limit);
                    let preamble = if parsed.preamble.is_empty() {
                        replies::DEFAULT_PREAMBLE
                    } else {
                        parsed.preamble.as_str()
                    };
                    ChatResponse {
                        reply: render_reply(preamble, &render_product_grid(&display)),
                        has_products: true,
                    }
                }
            }
            None => {
                let reply = if parsed.preamble.is_empty() {
                    replies::LEAD_ACK.to_string()
                } else {
                    parsed.preamble.clone()
                };
                ChatResponse { reply, has_products: false }
            }
        };

        info!(
            event_name = "chat.turn.completed",
            session_id = %request.session_id,
            has_products = response.has_products,
        );

        if let Err(error) = self
            .log
            .append(&request.session_id, &request.message, &response.reply, response.has_products)
            .await
        {
            warn!(event_name = "chat.log_append_failed", error = %error);
        }

        Ok(response)
    }

    /// Lead persistence never fails a turn.
    async fn save_lead(&self, name: &str, phone: &str, context: &str) {
        match self.leads.save_lead(name, phone, context).await {
            Ok(true) => info!(event_name = "lead.saved", source = name),
            Ok(false) => info!(event_name = "lead.skipped", source = name),
            Err(error) => warn!(event_name = "lead.save_failed", error = %error),
        }
    }
}
