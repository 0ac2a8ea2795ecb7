//! PostgreSQL implementation of link repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tracing::debug;

use crate::domain::entities::{
    NewReservedCode, NewShortLink, ReservedCode, ShortLink, ShortLinkPatch,
};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::utils::db_error::is_unique_violation_on_code;

#[derive(Debug, FromRow)]
struct LinkRow {
    id: i64,
    short_code: String,
    target_url: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<LinkRow> for ShortLink {
    fn from(row: LinkRow) -> Self {
        ShortLink::new(
            row.id,
            row.short_code,
            row.target_url,
            row.is_active,
            row.created_at,
            row.expires_at,
        )
    }
}

#[derive(Debug, FromRow)]
struct ReservedCodeRow {
    code: String,
    reason: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ReservedCodeRow> for ReservedCode {
    fn from(row: ReservedCodeRow) -> Self {
        ReservedCode {
            code: row.code,
            reason: row.reason,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL repository for short links and reserved codes.
///
/// The `urls_short_code_key` constraint is the arbiter for code uniqueness;
/// a violation on insert is reported as [`AppError::AlreadyTaken`].
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn create(&self, new_link: NewShortLink) -> Result<ShortLink, AppError> {
        let result = sqlx::query_as::<_, LinkRow>(
            r#"
            INSERT INTO urls (short_code, target_url, is_active, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, short_code, target_url, is_active, created_at, expires_at
            "#,
        )
        .bind(&new_link.code)
        .bind(&new_link.target_url)
        .bind(new_link.is_active)
        .bind(new_link.expires_at)
        .fetch_one(self.pool.as_ref())
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(e) if is_unique_violation_on_code(&e) => {
                debug!(code = %new_link.code, "Unique violation on insert");
                Err(AppError::AlreadyTaken {
                    code: new_link.code,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>, AppError> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, short_code, target_url, is_active, created_at, expires_at
            FROM urls
            WHERE short_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update(&self, code: &str, patch: ShortLinkPatch) -> Result<ShortLink, AppError> {
        let (set_expiry, expires_at) = match patch.expires_at {
            Some(expires_at) => (true, expires_at),
            None => (false, None),
        };

        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            UPDATE urls
            SET target_url = COALESCE($2::text, target_url),
                is_active  = COALESCE($3::boolean, is_active),
                expires_at = CASE WHEN $4::boolean THEN $5::timestamptz ELSE expires_at END
            WHERE short_code = $1
            RETURNING id, short_code, target_url, is_active, created_at, expires_at
            "#,
        )
        .bind(code)
        .bind(patch.target_url)
        .bind(patch.is_active)
        .bind(set_expiry)
        .bind(expires_at)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(Into::into).ok_or_else(|| AppError::NotFound {
            code: code.to_string(),
        })
    }

    async fn deactivate(&self, code: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE urls SET is_active = FALSE WHERE short_code = $1")
            .bind(code)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound {
                code: code.to_string(),
            });
        }

        Ok(())
    }

    async fn is_reserved(&self, code: &str) -> Result<bool, AppError> {
        let reserved = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM reserved_codes WHERE code = lower($1))",
        )
        .bind(code)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(reserved)
    }

    async fn add_reserved(&self, reserved: NewReservedCode) -> Result<ReservedCode, AppError> {
        let row = sqlx::query_as::<_, ReservedCodeRow>(
            r#"
            INSERT INTO reserved_codes (code, reason, description)
            VALUES (lower($1), $2, $3)
            ON CONFLICT (code) DO UPDATE
            SET reason = EXCLUDED.reason, description = EXCLUDED.description
            RETURNING code, reason, description, created_at
            "#,
        )
        .bind(&reserved.code)
        .bind(&reserved.reason)
        .bind(&reserved.description)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(row.into())
    }

    async fn list_reserved(&self) -> Result<Vec<ReservedCode>, AppError> {
        let rows = sqlx::query_as::<_, ReservedCodeRow>(
            "SELECT code, reason, description, created_at FROM reserved_codes ORDER BY code",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_recent(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ShortLink>, AppError> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, short_code, target_url, is_active, created_at, expires_at
            FROM urls
            WHERE created_at >= $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE urls
            SET is_active = FALSE
            WHERE expires_at IS NOT NULL
              AND expires_at <= $1
              AND is_active
            "#,
        )
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
