use sqlx::Row;

use super::{Store, StoreError};
use crate::models::ChatMessage;

impl Store {
    /// Replays a user's stored turns as an ordered transcript. Each stored
    /// row carries one human message and the reply it got; empty sides are
    /// skipped so partial rows never produce blank messages.
    pub async fn load_history(&self, user_id: i64) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT message, response
             FROM chatbot_history
             WHERE user_id = $1
             ORDER BY interaction_time ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len() * 2);
        for row in rows {
            let message: Option<String> = row.try_get("message")?;
            let response: Option<String> = row.try_get("response")?;

            if let Some(message) = message.filter(|text| !text.is_empty()) {
                messages.push(ChatMessage::human(message));
            }
            if let Some(response) = response.filter(|text| !text.is_empty()) {
                messages.push(ChatMessage::assistant(response));
            }
        }

        Ok(messages)
    }

    pub async fn persist_turn(
        &self,
        user_id: i64,
        message: &str,
        response: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO chatbot_history (user_id, message, response)
             VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(message)
        .bind(response)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
