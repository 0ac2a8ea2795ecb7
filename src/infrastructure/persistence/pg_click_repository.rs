//! PostgreSQL implementation of click repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::domain::entities::ClickFact;
use crate::domain::repositories::{COUNTER_SHARDS, ClickRepository};
use crate::error::AppError;

/// PostgreSQL repository for click facts.
///
/// Raw facts go to `click_events`. Totals are kept in `url_counters_live`,
/// spread over [`COUNTER_SHARDS`] rows per link so hot links do not serialize
/// on a single row lock.
pub struct PgClickRepository {
    pool: Arc<PgPool>,
}

impl PgClickRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn count_events(&self, link_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM click_events WHERE url_id = $1")
            .bind(link_id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl ClickRepository for PgClickRepository {
    async fn record(&self, fact: ClickFact) -> Result<i64, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO click_events (
                url_id, occurred_at, ip, ua, referrer,
                utm_source, utm_medium, utm_campaign, utm_term, utm_content,
                query_params
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(fact.link_id)
        .bind(fact.occurred_at)
        .bind(fact.ip)
        .bind(fact.user_agent)
        .bind(fact.referrer)
        .bind(fact.utm.source)
        .bind(fact.utm.medium)
        .bind(fact.utm.campaign)
        .bind(fact.utm.term)
        .bind(fact.utm.content)
        .bind(fact.query_params)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn increment_counter(&self, link_id: i64) -> Result<(), AppError> {
        let shard: i16 = rand::random_range(0..COUNTER_SHARDS);

        sqlx::query(
            r#"
            INSERT INTO url_counters_live (url_id, shard_id, clicks, updated_at)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (url_id, shard_id)
            DO UPDATE SET clicks = url_counters_live.clicks + 1, updated_at = NOW()
            "#,
        )
        .bind(link_id)
        .bind(shard)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn count(&self, link_id: i64) -> Result<i64, AppError> {
        let sharded = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(clicks), 0)::BIGINT FROM url_counters_live WHERE url_id = $1",
        )
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await;

        match sharded {
            Ok(count) => Ok(count),
            Err(e) => {
                warn!(link_id, error = %e, "Sharded counters unavailable, counting events");
                self.count_events(link_id).await
            }
        }
    }

    async fn last_clicked_at(&self, link_id: i64) -> Result<Option<DateTime<Utc>>, AppError> {
        let last = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(occurred_at) FROM click_events WHERE url_id = $1",
        )
        .bind(link_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(last)
    }
}
