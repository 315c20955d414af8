use async_trait::async_trait;
use chrono::Utc;

use docflow_core::approvals::ParticipantRegistry;
use docflow_core::domain::document::ActorId;

use super::RepositoryError;
use crate::DbPool;

/// Participant directory backed by the `participant` table. Deactivated
/// participants are unknown for new approval lines.
pub struct SqlParticipantRegistry {
    pool: DbPool,
}

impl SqlParticipantRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn register(
        &self,
        actor_id: ActorId,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO participant (id, display_name, active, created_at)
             VALUES (?, ?, 1, ?)
             ON CONFLICT(id) DO UPDATE SET
                 display_name = excluded.display_name,
                 active = 1",
        )
        .bind(actor_id.0)
        .bind(display_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn deactivate(&self, actor_id: ActorId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE participant SET active = 0 WHERE id = ?")
            .bind(actor_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_active(&self, actor_id: ActorId) -> Result<bool, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM participant WHERE id = ? AND active = 1")
                .bind(actor_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl ParticipantRegistry for SqlParticipantRegistry {
    async fn exists(&self, actor_id: ActorId) -> Result<bool, String> {
        self.is_active(actor_id).await.map_err(|error| error.to_string())
    }
}
