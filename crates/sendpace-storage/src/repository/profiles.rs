//! Profile repository

use chrono::{DateTime, Utc};
use sendpace_common::types::{CooldownMode, GroupId, ProfileId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CreateProfile, Profile, ProfileStatistics, ProfileWithStats};

/// Profile repository
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a profile along with its statistics row
    pub async fn create(&self, input: CreateProfile) -> Result<Profile, sqlx::Error> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (
                id, group_id, name, phone_number, device_uuid, api_token,
                max_per_hour, max_per_3hours, max_per_day
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.group_id)
        .bind(&input.name)
        .bind(&input.phone_number)
        .bind(&input.device_uuid)
        .bind(&input.api_token)
        .bind(input.max_per_hour)
        .bind(input.max_per_3hours)
        .bind(input.max_per_day)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO profile_statistics (id, profile_id) VALUES (gen_random_uuid(), $1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(profile)
    }

    /// Get a profile by ID
    pub async fn get(&self, id: ProfileId) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List all profiles in a group
    pub async fn list_by_group(&self, group_id: GroupId) -> Result<Vec<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles WHERE group_id = $1 ORDER BY created_at ASC",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
    }

    /// List active profiles in a group with their statistics
    ///
    /// Profile order is creation order; distribution and interleaving both
    /// depend on it being stable.
    pub async fn list_active_with_stats(
        &self,
        group_id: GroupId,
    ) -> Result<Vec<ProfileWithStats>, sqlx::Error> {
        let profiles = sqlx::query_as::<_, Profile>(
            r#"
            SELECT * FROM profiles
            WHERE group_id = $1 AND status = 'active'
            ORDER BY created_at ASC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        let mut result = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let stats = self.get_stats(profile.id).await?;
            result.push(ProfileWithStats { profile, stats });
        }

        Ok(result)
    }

    /// List active profile ids in a group
    pub async fn active_ids(&self, group_id: GroupId) -> Result<Vec<ProfileId>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM profiles WHERE group_id = $1 AND status = 'active'",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Get the highest-weight active profile in a group
    pub async fn best_active(&self, group_id: GroupId) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"
            SELECT * FROM profiles
            WHERE group_id = $1 AND status = 'active'
            ORDER BY weight_score DESC
            LIMIT 1
            "#,
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Update profile status with pause bookkeeping
    pub async fn set_status(
        &self,
        id: ProfileId,
        status: &str,
        pause_reason: Option<&str>,
    ) -> Result<Option<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles SET
                status = $2,
                pause_reason = $3,
                resume_at = CASE WHEN $2 = 'active' THEN NULL ELSE resume_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(pause_reason)
        .fetch_optional(&self.pool)
        .await
    }

    /// Record the time of the profile's last actual send
    pub async fn touch_last_message_at(&self, id: ProfileId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET last_message_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get the statistics row for a profile
    pub async fn get_stats(
        &self,
        profile_id: ProfileId,
    ) -> Result<Option<ProfileStatistics>, sqlx::Error> {
        sqlx::query_as::<_, ProfileStatistics>(
            "SELECT * FROM profile_statistics WHERE profile_id = $1",
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Update rolling statistics after a delivery attempt
    ///
    /// Increments the window counters, recomputes the 24h success rate, and
    /// folds the response time into the moving average as (old + new) / 2.
    pub async fn update_after_send(
        &self,
        profile_id: ProfileId,
        success: bool,
        response_time_ms: i32,
    ) -> Result<(), sqlx::Error> {
        let stats = match self.get_stats(profile_id).await? {
            Some(s) => s,
            None => {
                sqlx::query(
                    "INSERT INTO profile_statistics (id, profile_id) VALUES (gen_random_uuid(), $1) ON CONFLICT (profile_id) DO NOTHING",
                )
                .bind(profile_id)
                .execute(&self.pool)
                .await?;
                self.get_stats(profile_id).await?.ok_or(sqlx::Error::RowNotFound)?
            }
        };

        let sent_today = stats.messages_sent_today + 1;
        let failed_today = stats.failed_messages_today + if success { 0 } else { 1 };
        let success_rate =
            (((sent_today - failed_today) as f64 / sent_today as f64) * 10000.0).round() / 100.0;

        let avg_response = if response_time_ms > 0 {
            if stats.avg_response_time_ms == 0.0 {
                response_time_ms as f64
            } else {
                (stats.avg_response_time_ms + response_time_ms as f64) / 2.0
            }
        } else {
            stats.avg_response_time_ms
        };

        sqlx::query(
            r#"
            UPDATE profile_statistics SET
                messages_sent_total = messages_sent_total + 1,
                messages_sent_today = messages_sent_today + 1,
                messages_sent_hour = messages_sent_hour + 1,
                messages_sent_3hours = messages_sent_3hours + 1,
                failed_messages_today = failed_messages_today + $2,
                failed_messages_hour = failed_messages_hour + $2,
                success_rate_24h = $3,
                avg_response_time_ms = $4,
                updated_at = NOW()
            WHERE profile_id = $1
            "#,
        )
        .bind(profile_id)
        .bind(if success { 0 } else { 1 })
        .bind(success_rate)
        .bind(avg_response)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist a freshly computed cooldown
    ///
    /// The cooldown calculator is the only caller.
    pub async fn update_cooldown_state(
        &self,
        profile_id: ProfileId,
        cooldown_seconds: i32,
        mode: CooldownMode,
        expires_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE profile_statistics SET
                current_cooldown_seconds = $2,
                cooldown_mode = $3,
                cooldown_expires_at = $4,
                updated_at = NOW()
            WHERE profile_id = $1
            "#,
        )
        .bind(profile_id)
        .bind(cooldown_seconds)
        .bind(mode.to_string())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a profile
    pub async fn delete(&self, id: ProfileId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
