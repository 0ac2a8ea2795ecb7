//! Link creation, resolution and management.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::application::services::click_tracker::ClickTracker;
use crate::application::services::code_allocator::CodeAllocator;
use crate::config::ShortenerSettings;
use crate::domain::click_context::ClickContext;
use crate::domain::entities::{NewReservedCode, ReservedCode, ShortLink, ShortLinkPatch};
use crate::domain::repositories::{ClickRepository, LinkRepository};
use crate::error::AppError;
use crate::utils::code_generator::is_valid_code;
use crate::utils::deadline::with_deadline;
use crate::utils::url_normalizer::{normalize_url, validate_url};

pub const DEFAULT_RECENT_LIMIT: i64 = 10;
pub const MAX_RECENT_LIMIT: i64 = 100;
const RECENT_WINDOW_DAYS: i64 = 7;

/// Request to shorten a URL.
#[derive(Debug, Clone, Default)]
pub struct CreateLink {
    pub target_url: String,
    /// Empty or absent means a random code.
    pub custom_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update of a link.
///
/// `expires_at`: `None` leaves the expiry alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateLink {
    pub target_url: Option<String>,
    pub is_active: Option<bool>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// A link with its click statistics.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    pub link: ShortLink,
    pub click_count: i64,
    pub last_clicked_at: Option<DateTime<Utc>>,
}

/// Answer to "could this custom code be claimed right now?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAvailability {
    pub code: String,
    pub available: bool,
    pub reason: Option<String>,
}

impl CodeAvailability {
    fn available(code: &str) -> Self {
        Self {
            code: code.to_string(),
            available: true,
            reason: None,
        }
    }

    fn unavailable(code: &str, reason: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            available: false,
            reason: Some(reason.into()),
        }
    }
}

/// Service for creating, resolving and managing short links.
///
/// Store handles are passed in at construction; every store call runs under
/// the configured deadline. Click facts are handed to a [`ClickTracker`] and
/// never awaited on the redirect path.
pub struct LinkService<L: LinkRepository + ?Sized, C: ClickRepository + ?Sized> {
    link_repository: Arc<L>,
    click_repository: Arc<C>,
    allocator: CodeAllocator<L>,
    tracker: ClickTracker,
    store_timeout: Duration,
}

impl<L, C> LinkService<L, C>
where
    L: LinkRepository + ?Sized,
    C: ClickRepository + ?Sized,
{
    /// # Errors
    ///
    /// Returns an error if the shortener settings are out of range.
    pub fn new(
        link_repository: Arc<L>,
        click_repository: Arc<C>,
        tracker: ClickTracker,
        settings: &ShortenerSettings,
        store_timeout: Duration,
    ) -> Result<Self, AppError> {
        let allocator = CodeAllocator::new(link_repository.clone(), settings, store_timeout)?;

        Ok(Self {
            link_repository,
            click_repository,
            allocator,
            tracker,
            store_timeout,
        })
    }

    /// Creates a short link.
    ///
    /// The target is validated as given, then stored in normalized form.
    /// With a non-empty `custom_code` the custom path is taken, otherwise a
    /// random code is allocated.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidUrl`] before any store call
    /// - [`AppError::Validation`] if `expires_at` is not in the future
    /// - [`AppError::InvalidCustomCode`], [`AppError::Reserved`],
    ///   [`AppError::AlreadyTaken`] on the custom path
    /// - [`AppError::TooManyRetries`] on the random path
    pub async fn create_short_link(&self, request: CreateLink) -> Result<ShortLink, AppError> {
        validate_url(&request.target_url)?;
        let target_url = normalize_url(&request.target_url)?;

        if let Some(expires_at) = request.expires_at {
            ensure_future(expires_at)?;
        }

        let link = match request
            .custom_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        {
            Some(code) => {
                self.allocator
                    .assign_custom(code, &target_url, request.expires_at)
                    .await?
            }
            None => self.allocator.allocate(&target_url, request.expires_at).await?,
        };

        info!(
            code = %link.code,
            target_url = %link.target_url,
            expires_at = ?link.expires_at,
            "Short link created"
        );

        Ok(link)
    }

    /// Looks up `code` for a redirect and queues a click fact.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidCode`] without touching the store
    /// - [`AppError::NotFound`], [`AppError::Inactive`], [`AppError::Expired`]
    pub async fn resolve(&self, code: &str, context: ClickContext) -> Result<ShortLink, AppError> {
        let link = self.find_existing(code).await?;
        link.ensure_accessible_at(context.received_at)?;

        let outcome = self.tracker.track(&link, context);
        debug!(code = %link.code, ?outcome, "Resolved short link");

        Ok(link)
    }

    /// Returns a link with its click count and last click time.
    ///
    /// Counter failures are logged and reported as zero clicks.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidCode`] or [`AppError::NotFound`].
    pub async fn get_link_info(&self, code: &str) -> Result<LinkInfo, AppError> {
        let link = self.find_existing(code).await?;

        let click_count = match with_deadline(
            self.store_timeout,
            "count_clicks",
            self.click_repository.count(link.id),
        )
        .await
        {
            Ok(count) => count,
            Err(e) => {
                warn!(code = %link.code, error = %e, "Failed to load click count");
                0
            }
        };

        let last_clicked_at = match with_deadline(
            self.store_timeout,
            "last_clicked_at",
            self.click_repository.last_clicked_at(link.id),
        )
        .await
        {
            Ok(at) => at,
            Err(e) => {
                warn!(code = %link.code, error = %e, "Failed to load last click time");
                None
            }
        };

        Ok(LinkInfo {
            link,
            click_count,
            last_clicked_at,
        })
    }

    /// Applies a partial update. A new target goes through the same
    /// validation and normalization as on create.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for an empty update or a past expiry
    /// - [`AppError::InvalidUrl`] for a bad target
    /// - [`AppError::NotFound`]
    pub async fn update_link(&self, code: &str, update: UpdateLink) -> Result<ShortLink, AppError> {
        self.ensure_lookup_key(code)?;

        let target_url = match update.target_url.as_deref() {
            Some(url) => {
                validate_url(url)?;
                Some(normalize_url(url)?)
            }
            None => None,
        };

        if let Some(Some(expires_at)) = update.expires_at {
            ensure_future(expires_at)?;
        }

        let patch = ShortLinkPatch {
            target_url,
            is_active: update.is_active,
            expires_at: update.expires_at,
        };

        if patch.is_empty() {
            return Err(AppError::validation(
                "No fields to update",
                json!({ "code": code }),
            ));
        }

        let link = with_deadline(
            self.store_timeout,
            "update",
            self.link_repository.update(code, patch),
        )
        .await?;

        info!(code = %link.code, is_active = link.is_active, "Short link updated");
        Ok(link)
    }

    /// Marks a link inactive. Its code stays taken.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidCode`] or [`AppError::NotFound`].
    pub async fn deactivate_link(&self, code: &str) -> Result<(), AppError> {
        self.ensure_lookup_key(code)?;

        with_deadline(
            self.store_timeout,
            "deactivate",
            self.link_repository.deactivate(code),
        )
        .await?;

        info!(code = %code, "Short link deactivated");
        Ok(())
    }

    /// Checks format, both reserved lists and the store.
    ///
    /// # Errors
    ///
    /// Only store failures are errors; an unusable code is reported in the
    /// returned [`CodeAvailability`].
    pub async fn check_custom_code(&self, code: &str) -> Result<CodeAvailability, AppError> {
        let code = code.trim();

        if code.is_empty() {
            return Ok(CodeAvailability::unavailable(code, "Custom code cannot be empty"));
        }

        if let Err(e) = self.allocator.custom_code_validator().validate(code) {
            return Ok(CodeAvailability::unavailable(code, e.to_string()));
        }

        if with_deadline(
            self.store_timeout,
            "is_reserved",
            self.link_repository.is_reserved(code),
        )
        .await?
        {
            return Ok(CodeAvailability::unavailable(
                code,
                format!("Code '{code}' is reserved"),
            ));
        }

        if with_deadline(
            self.store_timeout,
            "find_by_code",
            self.link_repository.find_by_code(code),
        )
        .await?
        .is_some()
        {
            return Ok(CodeAvailability::unavailable(
                code,
                format!("Code '{code}' is already taken"),
            ));
        }

        Ok(CodeAvailability::available(code))
    }

    /// Links created in the last 7 days, newest first.
    ///
    /// `limit` defaults to 10 and is clamped to `1..=100`.
    pub async fn recent_links(&self, limit: Option<i64>) -> Result<Vec<ShortLink>, AppError> {
        let limit = limit
            .unwrap_or(DEFAULT_RECENT_LIMIT)
            .clamp(1, MAX_RECENT_LIMIT);
        let since = Utc::now() - chrono::Duration::days(RECENT_WINDOW_DAYS);

        with_deadline(
            self.store_timeout,
            "list_recent",
            self.link_repository.list_recent(since, limit),
        )
        .await
    }

    /// Adds a code to the stored reserved list.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidCustomCode`] if the code could never be
    /// claimed anyway.
    pub async fn reserve_code(
        &self,
        code: &str,
        reason: &str,
        description: Option<String>,
    ) -> Result<ReservedCode, AppError> {
        let code = code.trim();
        self.allocator
            .custom_code_validator()
            .check_shape(code)
            .map_err(AppError::InvalidCustomCode)?;

        let reserved = with_deadline(
            self.store_timeout,
            "add_reserved",
            self.link_repository
                .add_reserved(NewReservedCode::new(code, reason, description)),
        )
        .await?;

        info!(code = %reserved.code, reason = %reserved.reason, "Code reserved");
        Ok(reserved)
    }

    pub async fn reserved_codes(&self) -> Result<Vec<ReservedCode>, AppError> {
        with_deadline(
            self.store_timeout,
            "list_reserved",
            self.link_repository.list_reserved(),
        )
        .await
    }

    /// Deactivates every active link whose expiry has passed.
    pub async fn cleanup_expired(&self) -> Result<u64, AppError> {
        let affected = with_deadline(
            self.store_timeout,
            "deactivate_expired",
            self.link_repository.deactivate_expired(Utc::now()),
        )
        .await?;

        info!(affected, "Expired links deactivated");
        Ok(affected)
    }

    /// Whether the link store answers within the deadline.
    pub async fn store_healthy(&self) -> bool {
        tokio::time::timeout(self.store_timeout, self.link_repository.health_check())
            .await
            .unwrap_or(false)
    }

    pub fn click_tracker(&self) -> &ClickTracker {
        &self.tracker
    }

    pub fn current_code_length(&self) -> usize {
        self.allocator.current_code_length()
    }

    /// Whether `code` could ever have been assigned, as a random or a
    /// custom code.
    pub fn is_lookup_key(&self, code: &str) -> bool {
        is_valid_code(code)
            || self
                .allocator
                .custom_code_validator()
                .check_shape(code)
                .is_ok()
    }

    fn ensure_lookup_key(&self, code: &str) -> Result<(), AppError> {
        if self.is_lookup_key(code) {
            Ok(())
        } else {
            Err(AppError::InvalidCode {
                code: code.to_string(),
            })
        }
    }

    async fn find_existing(&self, code: &str) -> Result<ShortLink, AppError> {
        self.ensure_lookup_key(code)?;

        with_deadline(
            self.store_timeout,
            "find_by_code",
            self.link_repository.find_by_code(code),
        )
        .await?
        .ok_or_else(|| AppError::NotFound {
            code: code.to_string(),
        })
    }
}

fn ensure_future(expires_at: DateTime<Utc>) -> Result<(), AppError> {
    if expires_at <= Utc::now() {
        return Err(AppError::validation(
            "Expiration time must be in the future",
            json!({ "expires_at": expires_at.to_rfc3339() }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::click_tracker::ClickPolicy;
    use crate::domain::entities::ClickFact;
    use crate::domain::repositories::{MockClickRepository, MockLinkRepository};
    use chrono::Duration as ChronoDuration;
    use tokio::sync::mpsc;

    type TestService = LinkService<MockLinkRepository, MockClickRepository>;

    fn policy() -> ClickPolicy {
        ClickPolicy {
            enabled: true,
            anonymize_ips: true,
            respect_do_not_track: true,
        }
    }

    fn service(
        links: MockLinkRepository,
        clicks: MockClickRepository,
    ) -> (TestService, mpsc::Receiver<ClickFact>) {
        let (tx, rx) = mpsc::channel(16);
        let service = LinkService::new(
            Arc::new(links),
            Arc::new(clicks),
            ClickTracker::new(tx, policy()),
            &ShortenerSettings::default(),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        (service, rx)
    }

    fn stored(
        code: &str,
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> ShortLink {
        ShortLink::new(
            42,
            code.to_string(),
            "https://example.com/path".to_string(),
            is_active,
            Utc::now() - ChronoDuration::days(1),
            expires_at,
        )
    }

    #[tokio::test]
    async fn test_create_stores_normalized_url() {
        let mut links = MockLinkRepository::new();
        links.expect_find_by_code().returning(|_| Ok(None));
        links
            .expect_create()
            .withf(|new_link| new_link.target_url == "https://example.com/path?q=1")
            .times(1)
            .returning(|new_link| {
                Ok(ShortLink::new(
                    1,
                    new_link.code,
                    new_link.target_url,
                    true,
                    Utc::now(),
                    None,
                ))
            });

        let (service, _rx) = service(links, MockClickRepository::new());
        let link = service
            .create_short_link(CreateLink {
                target_url: "HTTPS://Example.COM:443/path?q=1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(link.target_url, "https://example.com/path?q=1");
        assert_eq!(link.code.len(), 7);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_url_before_store() {
        let (service, _rx) = service(MockLinkRepository::new(), MockClickRepository::new());

        for url in ["", "example.com", "ftp://example.com", "javascript:alert(1)"] {
            let result = service
                .create_short_link(CreateLink {
                    target_url: url.to_string(),
                    ..Default::default()
                })
                .await;
            assert!(
                matches!(result, Err(AppError::InvalidUrl(_))),
                "{url} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_create_rejects_past_expiry() {
        let (service, _rx) = service(MockLinkRepository::new(), MockClickRepository::new());

        let result = service
            .create_short_link(CreateLink {
                target_url: "https://example.com".to_string(),
                custom_code: None,
                expires_at: Some(Utc::now() - ChronoDuration::hours(1)),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_create_with_blank_custom_code_uses_random_path() {
        let mut links = MockLinkRepository::new();
        links.expect_is_reserved().times(0);
        links.expect_find_by_code().returning(|_| Ok(None));
        links.expect_create().returning(|new_link| {
            Ok(ShortLink::new(
                1,
                new_link.code,
                new_link.target_url,
                true,
                Utc::now(),
                None,
            ))
        });

        let (service, _rx) = service(links, MockClickRepository::new());
        let link = service
            .create_short_link(CreateLink {
                target_url: "https://example.com".to_string(),
                custom_code: Some("   ".to_string()),
                expires_at: None,
            })
            .await
            .unwrap();

        assert!(is_valid_code(&link.code));
    }

    #[tokio::test]
    async fn test_resolve_invalid_code_makes_no_store_call() {
        let mut links = MockLinkRepository::new();
        links.expect_find_by_code().times(0);

        let (service, mut rx) = service(links, MockClickRepository::new());
        let too_long = "x".repeat(51);

        for code in ["a", "has space", "bad@code", too_long.as_str()] {
            let result = service.resolve(code, ClickContext::anonymous()).await;
            assert!(matches!(result, Err(AppError::InvalidCode { .. })));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_resolve_queues_click_and_returns_target() {
        let mut links = MockLinkRepository::new();
        links
            .expect_find_by_code()
            .withf(|code| code == "abc1234")
            .times(1)
            .returning(|code| Ok(Some(stored(code, true, None))));

        let (service, mut rx) = service(links, MockClickRepository::new());
        let context = ClickContext::new(
            Some("203.0.113.7".parse().unwrap()),
            Some("Mozilla/5.0"),
            None,
            vec![("utm_source".to_string(), "mail".to_string())],
            false,
        );

        let link = service.resolve("abc1234", context).await.unwrap();
        assert_eq!(link.target_url, "https://example.com/path");

        let fact = rx.try_recv().unwrap();
        assert_eq!(fact.link_id, 42);
        assert_eq!(fact.ip.as_deref(), Some("203.0.113.0"));
        assert_eq!(fact.utm.source.as_deref(), Some("mail"));
    }

    #[tokio::test]
    async fn test_resolve_accepts_short_custom_codes() {
        let mut links = MockLinkRepository::new();
        links
            .expect_find_by_code()
            .times(1)
            .returning(|code| Ok(Some(stored(code, true, None))));

        let (service, _rx) = service(links, MockClickRepository::new());
        let link = service
            .resolve("go", ClickContext::anonymous())
            .await
            .unwrap();

        assert_eq!(link.code, "go");
    }

    #[tokio::test]
    async fn test_resolve_missing_code() {
        let mut links = MockLinkRepository::new();
        links.expect_find_by_code().returning(|_| Ok(None));

        let (service, _rx) = service(links, MockClickRepository::new());
        let result = service.resolve("abc1234", ClickContext::anonymous()).await;

        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_expired_and_inactive() {
        let past = Some(Utc::now() - ChronoDuration::minutes(5));

        let mut links = MockLinkRepository::new();
        links
            .expect_find_by_code()
            .withf(|code| code == "expired1")
            .returning(move |code| Ok(Some(stored(code, true, past))));
        links
            .expect_find_by_code()
            .withf(|code| code == "inactive1")
            .returning(move |code| Ok(Some(stored(code, false, past))));

        let (service, mut rx) = service(links, MockClickRepository::new());

        let expired = service.resolve("expired1", ClickContext::anonymous()).await;
        assert!(matches!(expired, Err(AppError::Expired { .. })));

        let inactive = service.resolve("inactive1", ClickContext::anonymous()).await;
        assert!(matches!(inactive, Err(AppError::Inactive { .. })));

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_link_info_survives_counter_failure() {
        let mut links = MockLinkRepository::new();
        links
            .expect_find_by_code()
            .returning(|code| Ok(Some(stored(code, true, None))));

        let mut clicks = MockClickRepository::new();
        clicks
            .expect_count()
            .returning(|_| Err(AppError::Database("counter table missing".to_string())));
        clicks.expect_last_clicked_at().returning(|_| Ok(None));

        let (service, _rx) = service(links, clicks);
        let info = service.get_link_info("abc1234").await.unwrap();

        assert_eq!(info.click_count, 0);
        assert!(info.last_clicked_at.is_none());
        assert_eq!(info.link.code, "abc1234");
    }

    #[tokio::test]
    async fn test_update_normalizes_target_and_clears_expiry() {
        let mut links = MockLinkRepository::new();
        links
            .expect_update()
            .withf(|code, patch| {
                code == "abc1234"
                    && patch.target_url.as_deref() == Some("https://new.example.com/landing")
                    && patch.expires_at == Some(None)
                    && patch.is_active.is_none()
            })
            .times(1)
            .returning(|code, patch| {
                let mut link = stored(code, true, Some(Utc::now()));
                patch.apply_to(&mut link);
                Ok(link)
            });

        let (service, _rx) = service(links, MockClickRepository::new());
        let link = service
            .update_link(
                "abc1234",
                UpdateLink {
                    target_url: Some("https://NEW.example.com/landing".to_string()),
                    is_active: None,
                    expires_at: Some(None),
                },
            )
            .await
            .unwrap();

        assert_eq!(link.target_url, "https://new.example.com/landing");
        assert!(link.expires_at.is_none());
    }

    #[tokio::test]
    async fn test_empty_update_is_rejected() {
        let mut links = MockLinkRepository::new();
        links.expect_update().times(0);

        let (service, _rx) = service(links, MockClickRepository::new());
        let result = service.update_link("abc1234", UpdateLink::default()).await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_check_custom_code_reasons() {
        let mut links = MockLinkRepository::new();
        links
            .expect_is_reserved()
            .returning(|code| Ok(code == "status"));
        links.expect_find_by_code().returning(|code| {
            if code == "taken" {
                Ok(Some(stored(code, true, None)))
            } else {
                Ok(None)
            }
        });

        let (service, _rx) = service(links, MockClickRepository::new());

        let free = service.check_custom_code("my-promo").await.unwrap();
        assert!(free.available);
        assert!(free.reason.is_none());

        for code in ["", "a", "admin", "my@code", "status", "taken"] {
            let availability = service.check_custom_code(code).await.unwrap();
            assert!(!availability.available, "{code} should be unavailable");
            assert!(availability.reason.is_some());
        }
    }

    #[tokio::test]
    async fn test_recent_links_limit_is_clamped() {
        let mut links = MockLinkRepository::new();
        links
            .expect_list_recent()
            .withf(|_, limit| *limit == 100)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        links
            .expect_list_recent()
            .withf(|_, limit| *limit == 1)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        links
            .expect_list_recent()
            .withf(|since, limit| {
                *limit == 10 && *since < Utc::now() - ChronoDuration::days(6)
            })
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let (service, _rx) = service(links, MockClickRepository::new());

        service.recent_links(Some(500)).await.unwrap();
        service.recent_links(Some(0)).await.unwrap();
        service.recent_links(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_reserve_code_is_stored_lowercase() {
        let mut links = MockLinkRepository::new();
        links
            .expect_add_reserved()
            .withf(|reserved| reserved.code == "status" && reserved.reason == "system")
            .times(1)
            .returning(|reserved| {
                Ok(ReservedCode {
                    code: reserved.code,
                    reason: reserved.reason,
                    description: reserved.description,
                    created_at: Utc::now(),
                })
            });

        let (service, _rx) = service(links, MockClickRepository::new());
        let reserved = service.reserve_code("Status", "system", None).await.unwrap();

        assert_eq!(reserved.code, "status");
    }
}
