use sqlx::{Pool, Sqlite};
use crate::db::models::Ban;
use crate::error::AppError;

/// Ban list keyed by ip hash. The chat path only reads it; `add` and
/// `remove` are the administrative side.
pub struct BanRepository;

impl BanRepository {
    pub async fn is_banned(
        pool: &Pool<Sqlite>,
        ip_hash: &str,
    ) -> Result<bool, AppError> {
        let ban = Self::get(pool, ip_hash).await?;
        Ok(ban.is_some())
    }

    pub async fn get(
        pool: &Pool<Sqlite>,
        ip_hash: &str,
    ) -> Result<Option<Ban>, AppError> {
        let ban = sqlx::query_as::<_, Ban>(
            "SELECT ip_hash, reason, created_at FROM ip_bans WHERE ip_hash = ?"
        )
        .bind(ip_hash)
        .fetch_optional(pool)
        .await?;

        Ok(ban)
    }

    pub async fn add(
        pool: &Pool<Sqlite>,
        ip_hash: &str,
        reason: Option<&str>,
    ) -> Result<Ban, AppError> {
        let created_at = chrono::Utc::now().timestamp_millis();

        let ban = sqlx::query_as::<_, Ban>(
            r#"
INSERT INTO ip_bans (ip_hash, reason, created_at)
VALUES (?, ?, ?)
ON CONFLICT(ip_hash) DO UPDATE SET reason = excluded.reason
RETURNING ip_hash, reason, created_at
            "#,
        )
        .bind(ip_hash)
        .bind(reason)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(ban)
    }

    pub async fn remove(
        pool: &Pool<Sqlite>,
        ip_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM ip_bans WHERE ip_hash = ?")
            .bind(ip_hash)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
