//! Short link entity: a code bound to a target URL.

use chrono::{DateTime, Utc};

use crate::error::AppError;

/// A short code bound to its target URL.
///
/// The `code` never changes after assignment. Only `target_url`, `is_active`
/// and `expires_at` can be modified, see [`ShortLinkPatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortLink {
    pub id: i64,
    pub code: String,
    pub target_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShortLink {
    /// Creates a new ShortLink instance.
    pub fn new(
        id: i64,
        code: String,
        target_url: String,
        is_active: bool,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            code,
            target_url,
            is_active,
            created_at,
            expires_at,
        }
    }

    /// Returns true if the expiry time has passed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| now >= e)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Active and not expired.
    pub fn is_accessible(&self) -> bool {
        self.is_active && !self.is_expired()
    }

    /// Checks whether the link may redirect at `now`.
    ///
    /// An inactive link reports [`AppError::Inactive`] even when it has also
    /// expired; [`AppError::Expired`] is only reported for active links.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Inactive`] or [`AppError::Expired`].
    pub fn ensure_accessible_at(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.is_active {
            return Err(AppError::Inactive {
                code: self.code.clone(),
            });
        }

        if self.is_expired_at(now) {
            return Err(AppError::Expired {
                code: self.code.clone(),
            });
        }

        Ok(())
    }
}

/// Input data for creating a new short link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShortLink {
    pub code: String,
    pub target_url: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewShortLink {
    /// An active link for `code` with an optional expiry.
    pub fn active(code: String, target_url: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            code,
            target_url,
            is_active: true,
            expires_at,
        }
    }
}

/// Partial update for an existing link.
///
/// `None` fields are left unchanged.
/// `expires_at: Some(None)` clears the expiry; `Some(Some(t))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortLinkPatch {
    pub target_url: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl ShortLinkPatch {
    pub fn is_empty(&self) -> bool {
        self.target_url.is_none() && self.is_active.is_none() && self.expires_at.is_none()
    }

    /// Applies the patch to `link` in place.
    pub fn apply_to(&self, link: &mut ShortLink) {
        if let Some(target_url) = &self.target_url {
            link.target_url = target_url.clone();
        }
        if let Some(is_active) = self.is_active {
            link.is_active = is_active;
        }
        if let Some(expires_at) = self.expires_at {
            link.expires_at = expires_at;
        }
    }
}
