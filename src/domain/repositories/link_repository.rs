//! Repository trait for short link storage.

use crate::domain::entities::{
    NewReservedCode, NewShortLink, ReservedCode, ShortLink, ShortLinkPatch,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable mapping from short code to target URL.
///
/// The store's uniqueness constraint on `code` is the only thing that decides
/// whether a code is taken. In-process checks are advisory.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryLinkRepository`] - in-process maps
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Persists a new short link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::AlreadyTaken`] if the code violates the uniqueness
    /// constraint. Returns [`AppError::Database`] on other storage errors.
    async fn create(&self, new_link: NewShortLink) -> Result<ShortLink, AppError>;

    /// Finds a link by its short code.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ShortLink))` if found, active or not
    /// - `Ok(None)` if not found
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Database`] on storage errors.
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>, AppError>;

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this code.
    async fn update(&self, code: &str, patch: ShortLinkPatch) -> Result<ShortLink, AppError>;

    /// Marks a link inactive. Deactivating an inactive link succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this code.
    async fn deactivate(&self, code: &str) -> Result<(), AppError>;

    /// Whether `code` is in the stored reserved list (case-insensitive).
    async fn is_reserved(&self, code: &str) -> Result<bool, AppError>;

    /// Adds or replaces a stored reserved code.
    async fn add_reserved(&self, reserved: NewReservedCode) -> Result<ReservedCode, AppError>;

    async fn list_reserved(&self) -> Result<Vec<ReservedCode>, AppError>;

    /// Links created at or after `since`, newest first.
    async fn list_recent(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ShortLink>, AppError>;

    /// Deactivates every active link whose expiry is at or before `now`.
    ///
    /// Returns the number of links changed.
    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;

    /// Returns `true` if the store answers.
    async fn health_check(&self) -> bool;
}
