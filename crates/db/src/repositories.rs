//! SQLite-backed implementations of the persistence seams: the lead sink and
//! the append-only conversation log.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use galleria_core::lead::{is_valid_local_phone, normalize_digits};
use galleria_core::ports::{ConversationLog, LeadStore, StorageError};

use crate::DbPool;

fn storage_error(error: sqlx::Error) -> StorageError {
    StorageError::Unavailable(error.to_string())
}

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for SqlLeadRepository {
    async fn save_lead(
        &self,
        name: &str,
        phone: &str,
        context: &str,
    ) -> Result<bool, StorageError> {
        let digits = normalize_digits(phone);
        if !is_valid_local_phone(&digits) {
            debug!(event_name = "lead.invalid_phone_rejected");
            return Ok(false);
        }

        // The unique phone_digits column makes a repeat capture a no-op.
        let result = sqlx::query(
            "INSERT INTO leads (phone, phone_digits, name, context, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(phone_digits) DO NOTHING",
        )
        .bind(phone)
        .bind(&digits)
        .bind(name)
        .bind(context)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct SqlConversationLogRepository {
    pool: DbPool,
}

impl SqlConversationLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationLog for SqlConversationLogRepository {
    async fn append(
        &self,
        session_id: &str,
        user_message: &str,
        bot_response: &str,
        has_products: bool,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO conversation_log (session_id, user_message, bot_response, has_products, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(user_message)
        .bind(bot_response)
        .bind(has_products as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }
}
