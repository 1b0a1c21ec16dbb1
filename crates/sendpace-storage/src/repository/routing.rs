//! Conversation routing repository

use sendpace_common::types::{GroupId, ProfileId};
use sqlx::PgPool;

use crate::models::ConversationRouting;

/// Conversation routing repository
///
/// Tracks which profile owns the conversation with a recipient so replies
/// are routed back through the same identity.
#[derive(Clone)]
pub struct RoutingRepository {
    pool: PgPool,
}

impl RoutingRepository {
    /// Create a new routing repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Look up the assigned profile for a recipient
    pub async fn get(
        &self,
        group_id: GroupId,
        recipient: &str,
    ) -> Result<Option<ConversationRouting>, sqlx::Error> {
        sqlx::query_as::<_, ConversationRouting>(
            "SELECT * FROM conversation_routing WHERE group_id = $1 AND recipient = $2",
        )
        .bind(group_id)
        .bind(recipient)
        .fetch_optional(&self.pool)
        .await
    }

    /// Assign (or reassign) a recipient's conversation to a profile
    pub async fn upsert(
        &self,
        group_id: GroupId,
        recipient: &str,
        profile_id: ProfileId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO conversation_routing (id, group_id, recipient, assigned_profile_id, last_interaction_at)
            VALUES (gen_random_uuid(), $1, $2, $3, NOW())
            ON CONFLICT (group_id, recipient)
            DO UPDATE SET assigned_profile_id = $3, last_interaction_at = NOW()
            "#,
        )
        .bind(group_id)
        .bind(recipient)
        .bind(profile_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
