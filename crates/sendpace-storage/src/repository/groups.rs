//! Group repository

use sendpace_common::types::GroupId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateGroup, Group};

/// Group repository
#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    /// Create a new group repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a new group
    pub async fn create(&self, input: CreateGroup) -> Result<Group, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (
                id, name, description, distribution_strategy,
                max_per_hour, max_per_3hours, max_per_day, max_concurrent_sends,
                freeze_hours, rush_hour_threshold, rush_hour_multiplier,
                quiet_mode_threshold, quiet_mode_multiplier,
                retry_attempts, retry_delay_seconds
            )
            VALUES (
                $1, $2, $3, COALESCE($4, 'rotate'),
                COALESCE($5, 20), COALESCE($6, 45), COALESCE($7, 120), COALESCE($8, 4),
                COALESCE($9, 4), COALESCE($10, 10), COALESCE($11, 2.0),
                COALESCE($12, 5), COALESCE($13, 0.5),
                COALESCE($14, 3), COALESCE($15, 5)
            )
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.distribution_strategy)
        .bind(input.max_per_hour)
        .bind(input.max_per_3hours)
        .bind(input.max_per_day)
        .bind(input.max_concurrent_sends)
        .bind(input.freeze_hours)
        .bind(input.rush_hour_threshold)
        .bind(input.rush_hour_multiplier)
        .bind(input.quiet_mode_threshold)
        .bind(input.quiet_mode_multiplier)
        .bind(input.retry_attempts)
        .bind(input.retry_delay_seconds)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a group by ID
    pub async fn get(&self, id: GroupId) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List all groups
    pub async fn list(&self) -> Result<Vec<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM groups ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
    }

    /// Update group status
    pub async fn set_status(&self, id: GroupId, status: &str) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            "UPDATE groups SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a group (cascades to profiles, messages, queue items)
    pub async fn delete(&self, id: GroupId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
