//! The chat endpoint. Errors never leak technical detail to the widget: a
//! bad request gets a JSON error, everything else gets the canned apology.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::error;

use galleria_agent::{ChatRequest, ChatRuntime, HistoryTurn};
use galleria_core::errors::InterfaceError;
use galleria_core::render::replies;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct ChatState {
    pub runtime: Arc<ChatRuntime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_history")]
    pub history: Vec<HistoryTurn>,
    #[serde(default)]
    pub session_id: Option<String>,
}

// A null or malformed history reads as no history, not a rejected request.
fn lenient_history<'de, D>(deserializer: D) -> Result<Vec<HistoryTurn>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    pub has_products: bool,
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/chat", post(chat)).with_state(state)
}

pub async fn chat(
    State(state): State<ChatState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>, (StatusCode, Json<Value>)> {
    let session_id = match body.session_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "sessionId is required" })),
            ));
        }
    };

    let request =
        ChatRequest { session_id, message: body.message, history: body.history };

    match state.runtime.handle_message(request).await {
        Ok(response) => {
            Ok(Json(ChatReply { reply: response.reply, has_products: response.has_products }))
        }
        Err(application_error) => {
            let correlation_id =
                format!("req-{}", REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed));
            let interface = application_error.into_interface(correlation_id.clone());
            error!(
                event_name = "chat.turn.failed",
                correlation_id = %correlation_id,
                error = %interface,
            );
            match interface {
                InterfaceError::BadRequest { .. } => Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": interface.user_message() })),
                )),
                InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                    // The widget renders whatever lands in `reply`, so the
                    // apology travels on the normal field.
                    Err((
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "reply": replies::APOLOGY })),
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChatBody;

    #[test]
    fn body_decodes_with_camel_case_session_id() {
        let raw = r#"{"message": "שלום", "sessionId": "abc", "history": []}"#;
        let body: ChatBody = serde_json::from_str(raw).expect("valid chat body");

        assert_eq!(body.session_id.as_deref(), Some("abc"));
        assert_eq!(body.message, "שלום");
    }

    #[test]
    fn missing_fields_default() {
        let body: ChatBody = serde_json::from_str("{}").expect("empty body decodes");

        assert!(body.session_id.is_none());
        assert!(body.message.is_empty());
        assert!(body.history.is_empty());
    }

    #[test]
    fn history_turns_decode_sender_and_content() {
        let raw = r#"{"sessionId": "s", "history": [{"sender": "user", "content": "היי"}]}"#;
        let body: ChatBody = serde_json::from_str(raw).expect("valid chat body");

        assert_eq!(body.history.len(), 1);
        assert_eq!(body.history[0].sender, "user");
    }

    #[test]
    fn null_history_reads_as_empty() {
        let raw = r#"{"sessionId": "s", "history": null}"#;
        let body: ChatBody = serde_json::from_str(raw).expect("body decodes");

        assert!(body.history.is_empty());
    }

    #[test]
    fn non_list_history_reads_as_empty() {
        let raw = r#"{"sessionId": "s", "history": "corrupted"}"#;
        let body: ChatBody = serde_json::from_str(raw).expect("body decodes");

        assert!(body.history.is_empty());
    }
}
