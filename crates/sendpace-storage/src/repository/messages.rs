//! Message repository

use sendpace_common::types::{GroupId, MessageId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateMessage, Message, MessageStatus};

/// Message repository
#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Create a new message repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a new message
    pub async fn create(&self, input: CreateMessage) -> Result<Message, sqlx::Error> {
        let id = Uuid::new_v4();
        let recipients = serde_json::json!(input.recipients);
        let total = input
            .total_recipients
            .unwrap_or(input.recipients.len() as i32);

        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (
                id, group_id, message_mode, message_type, content, media_url,
                caption, recipients, status, scheduled_at, total_recipients
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.group_id)
        .bind(&input.message_mode)
        .bind(&input.message_type)
        .bind(&input.content)
        .bind(&input.media_url)
        .bind(&input.caption)
        .bind(&recipients)
        .bind(input.status.to_string())
        .bind(input.scheduled_at)
        .bind(total)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a message by ID
    pub async fn get(&self, id: MessageId) -> Result<Option<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List messages for a group with optional status filter
    pub async fn list_by_group(
        &self,
        group_id: GroupId,
        status: Option<MessageStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, Message>(
                r#"
                SELECT * FROM messages
                WHERE group_id = $1 AND status = $2
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(group_id)
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Message>(
                r#"
                SELECT * FROM messages
                WHERE group_id = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(group_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Store the distribution result for auditability
    pub async fn set_distribution_result(
        &self,
        id: MessageId,
        result: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE messages SET distribution_result = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Update message status
    pub async fn update_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<Option<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            "UPDATE messages SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await
    }

    /// Record one processed recipient outcome
    ///
    /// The message flips to completed once every recipient is accounted for.
    pub async fn record_outcome(&self, id: MessageId, success: bool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE messages SET
                processed_count = processed_count + 1,
                success_count = success_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                failed_count = failed_count + CASE WHEN $2 THEN 0 ELSE 1 END,
                status = CASE
                    WHEN processed_count + 1 >= total_recipients THEN 'completed'
                    ELSE status
                END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get scheduled messages whose send time has arrived
    pub async fn get_scheduled_ready(&self, limit: i64) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE status = 'scheduled'
              AND scheduled_at <= NOW()
            ORDER BY scheduled_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Cancel a scheduled message that has not been queued yet
    pub async fn cancel_scheduled(&self, id: MessageId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE messages SET status = 'cancelled', updated_at = NOW() WHERE id = $1 AND status = 'scheduled'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
