//! Delivery log repository

use chrono::{DateTime, Utc};
use sendpace_common::types::{MessageId, ProfileId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateDeliveryLog, DeliveryLog};

/// Delivery log repository
///
/// Logs are immutable after insert; the engine only reads them back to count
/// recent sends for the cooldown trend correction.
#[derive(Clone)]
pub struct DeliveryLogRepository {
    pool: PgPool,
}

impl DeliveryLogRepository {
    /// Create a new delivery log repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Record one attempted send
    pub async fn create(&self, input: CreateDeliveryLog) -> Result<DeliveryLog, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, DeliveryLog>(
            r#"
            INSERT INTO delivery_logs (
                id, message_id, profile_id, recipient, provider_message_id,
                message_mode, status, attempt_count, error_message,
                response_time_ms, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.message_id)
        .bind(input.profile_id)
        .bind(&input.recipient)
        .bind(&input.provider_message_id)
        .bind(&input.message_mode)
        .bind(input.status.to_string())
        .bind(input.attempt_count)
        .bind(&input.error_message)
        .bind(input.response_time_ms)
        .bind(input.sent_at)
        .fetch_one(&self.pool)
        .await
    }

    /// Count successful sends for a profile since a point in time
    pub async fn sent_count_since(
        &self,
        profile_id: ProfileId,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM delivery_logs
            WHERE profile_id = $1
              AND created_at >= $2
              AND status = 'sent'
            "#,
        )
        .bind(profile_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// Get delivery logs for a message, newest first
    pub async fn list_by_message(
        &self,
        message_id: MessageId,
    ) -> Result<Vec<DeliveryLog>, sqlx::Error> {
        sqlx::query_as::<_, DeliveryLog>(
            r#"
            SELECT * FROM delivery_logs
            WHERE message_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await
    }
}
