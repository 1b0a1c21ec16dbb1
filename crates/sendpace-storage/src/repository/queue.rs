//! Queue item repository

use chrono::{DateTime, Utc};
use sendpace_common::types::{GroupId, MessageId, ProfileId};
use sqlx::{PgPool, Row};
use std::collections::HashMap;

use crate::models::QueueItem;

/// Queue item repository
#[derive(Clone)]
pub struct QueueRepository {
    pool: PgPool,
}

impl QueueRepository {
    /// Create a new queue repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a queue item by ID
    pub async fn get(&self, id: uuid::Uuid) -> Result<Option<QueueItem>, sqlx::Error> {
        sqlx::query_as::<_, QueueItem>("SELECT * FROM queue_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Count waiting items per profile for a group
    ///
    /// Profiles with nothing waiting are simply absent from the map; callers
    /// treat a missing entry as zero. This count is what makes distribution
    /// queue-aware.
    pub async fn waiting_counts_by_profile(
        &self,
        group_id: GroupId,
    ) -> Result<HashMap<ProfileId, i64>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT q.profile_id, COUNT(q.id) AS waiting
            FROM queue_items q
            JOIN profiles p ON p.id = q.profile_id
            WHERE p.group_id = $1 AND q.status = 'waiting'
            GROUP BY q.profile_id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::new();
        for row in rows {
            counts.insert(row.get::<uuid::Uuid, _>("profile_id"), row.get::<i64, _>("waiting"));
        }

        Ok(counts)
    }

    /// Count all waiting items across a group's profiles
    pub async fn waiting_count_for_group(&self, group_id: GroupId) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(q.id)
            FROM queue_items q
            JOIN profiles p ON p.id = q.profile_id
            WHERE p.group_id = $1 AND q.status = 'waiting'
            "#,
        )
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// Get waiting items whose send time has arrived
    ///
    /// Ordered by scheduled time with id as the tie breaker so sweeps are
    /// deterministic. Uses FOR UPDATE SKIP LOCKED for concurrent worker safety.
    pub async fn due_items(&self, limit: i64) -> Result<Vec<QueueItem>, sqlx::Error> {
        sqlx::query_as::<_, QueueItem>(
            r#"
            SELECT * FROM queue_items
            WHERE status = 'waiting'
              AND scheduled_send_at <= NOW()
            ORDER BY scheduled_send_at ASC, id ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Mark an item as processing and count the attempt
    ///
    /// Returns false if another worker already picked it up.
    pub async fn mark_processing(&self, id: uuid::Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE queue_items SET
                status = 'processing',
                attempt_count = attempt_count + 1,
                updated_at = NOW()
            WHERE id = $1 AND status = 'waiting'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark an item as sent
    pub async fn mark_sent(&self, id: uuid::Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE queue_items SET
                status = 'sent',
                sent_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark an item as terminally failed
    pub async fn mark_failed(&self, id: uuid::Uuid, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE queue_items SET
                status = 'failed',
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Put an item back in the queue for a retry at a future slot
    pub async fn reschedule_retry(
        &self,
        id: uuid::Uuid,
        error: &str,
        scheduled_send_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE queue_items SET
                status = 'waiting',
                last_error = $2,
                scheduled_send_at = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(scheduled_send_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Cancel all waiting items for a message
    ///
    /// Cancellation is a status transition only; other items keep the slots
    /// they were given.
    pub async fn cancel_by_message(&self, message_id: MessageId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE queue_items SET
                status = 'cancelled',
                updated_at = NOW()
            WHERE message_id = $1 AND status = 'waiting'
            "#,
        )
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Cancel all waiting items across a group
    pub async fn cancel_by_group(&self, group_id: GroupId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE queue_items SET
                status = 'cancelled',
                updated_at = NOW()
            WHERE status = 'waiting'
              AND profile_id IN (SELECT id FROM profiles WHERE group_id = $1)
            "#,
        )
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Get queue counts by status for a group
    pub async fn status_counts(&self, group_id: GroupId) -> Result<QueueStatusCounts, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE q.status = 'waiting') as waiting,
                COUNT(*) FILTER (WHERE q.status = 'processing') as processing,
                COUNT(*) FILTER (WHERE q.status = 'sent') as sent,
                COUNT(*) FILTER (WHERE q.status = 'failed') as failed,
                COUNT(*) FILTER (WHERE q.status = 'cancelled') as cancelled
            FROM queue_items q
            JOIN profiles p ON p.id = q.profile_id
            WHERE p.group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStatusCounts {
            waiting: row.get::<Option<i64>, _>("waiting").unwrap_or(0),
            processing: row.get::<Option<i64>, _>("processing").unwrap_or(0),
            sent: row.get::<Option<i64>, _>("sent").unwrap_or(0),
            failed: row.get::<Option<i64>, _>("failed").unwrap_or(0),
            cancelled: row.get::<Option<i64>, _>("cancelled").unwrap_or(0),
        })
    }

    /// Earliest waiting slot in a group, if any
    pub async fn next_send_at(
        &self,
        group_id: GroupId,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        let row: (Option<DateTime<Utc>>,) = sqlx::query_as(
            r#"
            SELECT MIN(q.scheduled_send_at)
            FROM queue_items q
            JOIN profiles p ON p.id = q.profile_id
            WHERE p.group_id = $1 AND q.status = 'waiting'
            "#,
        )
        .bind(group_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// List queue items for a group ordered by slot, for inspection
    pub async fn list_by_group(
        &self,
        group_id: GroupId,
        status: Option<&str>,
        limit: i64,
    ) -> Result<Vec<QueueItem>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, QueueItem>(
                r#"
                SELECT q.* FROM queue_items q
                JOIN profiles p ON p.id = q.profile_id
                WHERE p.group_id = $1 AND q.status = $2
                ORDER BY q.scheduled_send_at ASC
                LIMIT $3
                "#,
            )
            .bind(group_id)
            .bind(status)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, QueueItem>(
                r#"
                SELECT q.* FROM queue_items q
                JOIN profiles p ON p.id = q.profile_id
                WHERE p.group_id = $1
                ORDER BY q.scheduled_send_at ASC
                LIMIT $2
                "#,
            )
            .bind(group_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
    }
}

/// Queue counts by status for a group
#[derive(Debug, Clone, Default)]
pub struct QueueStatusCounts {
    pub waiting: i64,
    pub processing: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl QueueStatusCounts {
    pub fn total(&self) -> i64 {
        self.waiting + self.processing + self.sent + self.failed + self.cancelled
    }
}
