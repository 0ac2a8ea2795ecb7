//! Repository trait for click facts and counters.

use crate::domain::entities::ClickFact;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Number of counter shards per link.
pub const COUNTER_SHARDS: i16 = 64;

/// Append-only sink for click facts plus read-side counters.
///
/// Writes happen on the background click worker, never on the redirect path.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClickRepository: Send + Sync {
    /// Appends one click fact and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Database`] on storage errors.
    async fn record(&self, fact: ClickFact) -> Result<i64, AppError>;

    /// Adds one click to a randomly chosen counter shard of `link_id`.
    ///
    /// Best effort: callers log and skip failures.
    async fn increment_counter(&self, link_id: i64) -> Result<(), AppError>;

    /// Total clicks for `link_id`.
    async fn count(&self, link_id: i64) -> Result<i64, AppError>;

    /// Timestamp of the most recent click, if any.
    async fn last_clicked_at(&self, link_id: i64) -> Result<Option<DateTime<Utc>>, AppError>;
}
