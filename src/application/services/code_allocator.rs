//! Short code allocation with collision handling.
//!
//! # Random path
//!
//! Each attempt takes the current generator, draws a candidate, checks the store
//! and then writes. The write can still lose a race against another instance, so
//! a unique violation on write is treated exactly like a collision found by the
//! lookup. Every `collision_threshold` collisions the shared generator grows by
//! one symbol. After `max_retries` attempts the request fails with
//! [`AppError::TooManyRetries`].
//!
//! # Custom path
//!
//! No generation. The code is validated, checked against both reserved lists
//! and the store, then written once. A unique violation is
//! [`AppError::AlreadyTaken`] and is never retried.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::ShortenerSettings;
use crate::domain::entities::{NewShortLink, ShortLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::utils::code_generator::CodeGenerator;
use crate::utils::custom_code::CustomCodeValidator;
use crate::utils::deadline::with_deadline;

/// Result of a single random-path attempt.
enum Attempt {
    Assigned(ShortLink),
    Collision,
}

/// Assigns codes to new links.
///
/// One instance is shared by all requests of a service; the adaptive code
/// length lives in an atomically swapped immutable [`CodeGenerator`].
pub struct CodeAllocator<L: LinkRepository + ?Sized> {
    repository: Arc<L>,
    generator: ArcSwap<CodeGenerator>,
    custom_codes: CustomCodeValidator,
    max_retries: u32,
    collision_threshold: u32,
    store_timeout: Duration,
}

impl<L: LinkRepository + ?Sized> CodeAllocator<L> {
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if `default_code_length` is out of range.
    pub fn new(
        repository: Arc<L>,
        settings: &ShortenerSettings,
        store_timeout: Duration,
    ) -> Result<Self, AppError> {
        let generator = CodeGenerator::new(settings.default_code_length)?;

        Ok(Self {
            repository,
            generator: ArcSwap::from_pointee(generator),
            custom_codes: CustomCodeValidator::new(settings.max_custom_code_length),
            max_retries: settings.max_retries.max(1),
            collision_threshold: settings.collision_threshold.max(1),
            store_timeout,
        })
    }

    /// Length of the codes the next attempt will generate.
    pub fn current_code_length(&self) -> usize {
        self.generator.load().length()
    }

    pub fn custom_code_validator(&self) -> &CustomCodeValidator {
        &self.custom_codes
    }

    /// Allocates a random code and persists the link.
    ///
    /// The generator grows once per `collision_threshold` collisions, not on
    /// every collision past the threshold, so defaults give 7, 7, 7, 8, 8.
    ///
    /// # Errors
    ///
    /// - [`AppError::TooManyRetries`] after `max_retries` collisions
    /// - [`AppError::RandomSource`] if the CSPRNG fails (not retried)
    /// - [`AppError::Database`] / [`AppError::Timeout`] from the store
    pub async fn allocate(
        &self,
        target_url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShortLink, AppError> {
        let mut collisions: u32 = 0;
        let mut last_collision = None;

        for attempt in 1..=self.max_retries {
            let generator = **self.generator.load();
            let code = generator.generate()?;

            debug!(attempt, code = %code, length = generator.length(), "Checking candidate code");

            match self.try_assign(&code, target_url, expires_at).await? {
                Attempt::Assigned(link) => {
                    debug!(attempt, code = %link.code, "Code assigned");
                    return Ok(link);
                }
                Attempt::Collision => {
                    collisions += 1;
                    metrics::counter!("shortcode_collisions_total").increment(1);
                    warn!(
                        attempt,
                        code = %code,
                        collisions,
                        "Short code collision, retrying"
                    );

                    if collisions % self.collision_threshold == 0 {
                        self.grow_from(generator);
                    }

                    last_collision = Some(code);
                }
            }
        }

        metrics::counter!("shortcode_allocation_exhausted_total").increment(1);
        error!(
            attempts = self.max_retries,
            last_collision = ?last_collision,
            code_length = self.current_code_length(),
            "Short code allocation exhausted, keyspace under pressure"
        );

        Err(AppError::TooManyRetries {
            attempts: self.max_retries,
            last_collision,
        })
    }

    /// Claims a caller-chosen code.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidCustomCode`] for bad length or characters
    /// - [`AppError::Reserved`] for fixed or stored reserved codes
    /// - [`AppError::AlreadyTaken`] if the code exists or the write loses a race
    pub async fn assign_custom(
        &self,
        code: &str,
        target_url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShortLink, AppError> {
        self.custom_codes.validate(code)?;

        if with_deadline(
            self.store_timeout,
            "is_reserved",
            self.repository.is_reserved(code),
        )
        .await?
        {
            return Err(AppError::Reserved {
                code: code.to_string(),
            });
        }

        if with_deadline(
            self.store_timeout,
            "find_by_code",
            self.repository.find_by_code(code),
        )
        .await?
        .is_some()
        {
            return Err(AppError::AlreadyTaken {
                code: code.to_string(),
            });
        }

        let new_link = NewShortLink::active(code.to_string(), target_url.to_string(), expires_at);
        let link = with_deadline(self.store_timeout, "create", self.repository.create(new_link))
            .await?;

        info!(code = %link.code, "Custom code claimed");
        Ok(link)
    }

    async fn try_assign(
        &self,
        code: &str,
        target_url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Attempt, AppError> {
        let existing = with_deadline(
            self.store_timeout,
            "find_by_code",
            self.repository.find_by_code(code),
        )
        .await?;

        if existing.is_some() {
            return Ok(Attempt::Collision);
        }

        let new_link = NewShortLink::active(code.to_string(), target_url.to_string(), expires_at);

        match with_deadline(self.store_timeout, "create", self.repository.create(new_link)).await {
            Ok(link) => Ok(Attempt::Assigned(link)),
            Err(AppError::AlreadyTaken { .. }) => Ok(Attempt::Collision),
            Err(e) => Err(e),
        }
    }

    /// Swaps in a generator one symbol longer than `observed`.
    ///
    /// Only replaces the current generator if it still has the observed length,
    /// so concurrent requests growing from the same state grow it once.
    fn grow_from(&self, observed: CodeGenerator) {
        let Some(next) = observed.grown() else {
            warn!(
                length = observed.length(),
                "Code length already at maximum, cannot grow"
            );
            return;
        };

        let previous = self.generator.rcu(|current| {
            if current.length() == observed.length() {
                Arc::new(next)
            } else {
                Arc::clone(current)
            }
        });

        if previous.length() == observed.length() {
            info!(
                from = observed.length(),
                to = next.length(),
                "Growing short code length after repeated collisions"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockLinkRepository;
    use std::sync::Mutex;

    fn settings(max_retries: u32, collision_threshold: u32) -> ShortenerSettings {
        ShortenerSettings {
            max_retries,
            collision_threshold,
            ..Default::default()
        }
    }

    fn stored(code: &str, target_url: &str) -> ShortLink {
        ShortLink::new(
            1,
            code.to_string(),
            target_url.to_string(),
            true,
            Utc::now(),
            None,
        )
    }

    fn allocator(repo: MockLinkRepository, settings: ShortenerSettings) -> CodeAllocator<MockLinkRepository> {
        CodeAllocator::new(Arc::new(repo), &settings, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_first_free_candidate_is_assigned() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(1).returning(|_| Ok(None));
        repo.expect_create()
            .withf(|new_link| new_link.code.len() == 7 && new_link.is_active)
            .times(1)
            .returning(|new_link| Ok(stored(&new_link.code, &new_link.target_url)));

        let allocator = allocator(repo, settings(5, 3));
        let link = allocator
            .allocate("https://example.com/path", None)
            .await
            .unwrap();

        assert_eq!(link.code.len(), 7);
        assert_eq!(link.target_url, "https://example.com/path");
    }

    #[tokio::test]
    async fn test_gives_up_after_exactly_max_retries() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .times(5)
            .returning(|code| Ok(Some(stored(code, "https://taken.example"))));
        repo.expect_create().times(0);

        let allocator = allocator(repo, settings(5, 3));
        let err = allocator
            .allocate("https://example.com", None)
            .await
            .unwrap_err();

        match err {
            AppError::TooManyRetries {
                attempts,
                last_collision,
            } => {
                assert_eq!(attempts, 5);
                assert!(last_collision.is_some());
            }
            other => panic!("expected TooManyRetries, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unique_violation_on_write_is_retried() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(2).returning(|_| Ok(None));

        let writes = Arc::new(Mutex::new(0));
        let seen = writes.clone();
        repo.expect_create().times(2).returning(move |new_link| {
            let mut count = seen.lock().unwrap();
            *count += 1;
            if *count == 1 {
                Err(AppError::AlreadyTaken {
                    code: new_link.code,
                })
            } else {
                Ok(stored(&new_link.code, &new_link.target_url))
            }
        });

        let allocator = allocator(repo, settings(5, 3));
        let link = allocator.allocate("https://example.com", None).await.unwrap();

        assert_eq!(*writes.lock().unwrap(), 2);
        assert_eq!(link.code.len(), 7);
    }

    #[tokio::test]
    async fn test_code_length_grows_at_threshold() {
        let lengths = Arc::new(Mutex::new(Vec::new()));
        let seen = lengths.clone();

        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(5).returning(move |code| {
            seen.lock().unwrap().push(code.len());
            Ok(Some(stored(code, "https://taken.example")))
        });

        let allocator = allocator(repo, settings(5, 3));
        assert_eq!(allocator.current_code_length(), 7);

        let result = allocator.allocate("https://example.com", None).await;

        assert!(matches!(result, Err(AppError::TooManyRetries { .. })));
        assert_eq!(*lengths.lock().unwrap(), vec![7, 7, 7, 8, 8]);
        assert_eq!(allocator.current_code_length(), 8);
    }

    #[tokio::test]
    async fn test_growth_persists_across_requests() {
        let mut repo = MockLinkRepository::new();
        let calls = Arc::new(Mutex::new(0));
        let seen = calls.clone();
        repo.expect_find_by_code().returning(move |code| {
            let mut n = seen.lock().unwrap();
            *n += 1;
            if *n <= 3 {
                Ok(Some(stored(code, "https://taken.example")))
            } else {
                Ok(None)
            }
        });
        repo.expect_create()
            .returning(|new_link| Ok(stored(&new_link.code, &new_link.target_url)));

        let allocator = allocator(repo, settings(5, 3));

        let first = allocator.allocate("https://a.example", None).await.unwrap();
        assert_eq!(first.code.len(), 8);

        let second = allocator.allocate("https://b.example", None).await.unwrap();
        assert_eq!(second.code.len(), 8);
    }

    #[tokio::test]
    async fn test_growth_is_capped_at_max_length() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .times(4)
            .returning(|code| Ok(Some(stored(code, "https://taken.example"))));

        let settings = ShortenerSettings {
            max_retries: 4,
            collision_threshold: 1,
            default_code_length: 11,
            ..Default::default()
        };
        let allocator = allocator(repo, settings);

        let _ = allocator.allocate("https://example.com", None).await;
        assert_eq!(allocator.current_code_length(), 12);
    }

    #[tokio::test]
    async fn test_store_failure_is_not_retried() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .times(1)
            .returning(|_| Err(AppError::Database("connection reset".to_string())));
        repo.expect_create().times(0);

        let allocator = allocator(repo, settings(5, 3));
        let result = allocator.allocate("https://example.com", None).await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_custom_code_is_claimed() {
        let mut repo = MockLinkRepository::new();
        repo.expect_is_reserved()
            .withf(|code| code == "launch-2025")
            .times(1)
            .returning(|_| Ok(false));
        repo.expect_find_by_code().times(1).returning(|_| Ok(None));
        repo.expect_create()
            .withf(|new_link| new_link.code == "launch-2025")
            .times(1)
            .returning(|new_link| Ok(stored(&new_link.code, &new_link.target_url)));

        let allocator = allocator(repo, settings(5, 3));
        let link = allocator
            .assign_custom("launch-2025", "https://example.com", None)
            .await
            .unwrap();

        assert_eq!(link.code, "launch-2025");
    }

    #[tokio::test]
    async fn test_custom_code_rejected_before_store_when_malformed() {
        let repo = MockLinkRepository::new();
        let allocator = allocator(repo, settings(5, 3));

        let result = allocator
            .assign_custom("my@code", "https://example.com", None)
            .await;
        assert!(matches!(result, Err(AppError::InvalidCustomCode(_))));

        let result = allocator
            .assign_custom("Admin", "https://example.com", None)
            .await;
        assert!(matches!(result, Err(AppError::Reserved { .. })));
    }

    #[tokio::test]
    async fn test_custom_code_in_stored_reserved_list() {
        let mut repo = MockLinkRepository::new();
        repo.expect_is_reserved().times(1).returning(|_| Ok(true));
        repo.expect_find_by_code().times(0);
        repo.expect_create().times(0);

        let allocator = allocator(repo, settings(5, 3));
        let result = allocator
            .assign_custom("status", "https://example.com", None)
            .await;

        assert!(matches!(result, Err(AppError::Reserved { code }) if code == "status"));
    }

    #[tokio::test]
    async fn test_custom_code_already_taken() {
        let mut repo = MockLinkRepository::new();
        repo.expect_is_reserved().returning(|_| Ok(false));
        repo.expect_find_by_code()
            .times(1)
            .returning(|code| Ok(Some(stored(code, "https://other.example"))));
        repo.expect_create().times(0);

        let allocator = allocator(repo, settings(5, 3));
        let result = allocator
            .assign_custom("promo", "https://example.com", None)
            .await;

        assert!(matches!(result, Err(AppError::AlreadyTaken { .. })));
    }

    #[tokio::test]
    async fn test_custom_code_race_is_not_retried() {
        let mut repo = MockLinkRepository::new();
        repo.expect_is_reserved().returning(|_| Ok(false));
        repo.expect_find_by_code().times(1).returning(|_| Ok(None));
        repo.expect_create().times(1).returning(|new_link| {
            Err(AppError::AlreadyTaken {
                code: new_link.code,
            })
        });

        let allocator = allocator(repo, settings(5, 3));
        let result = allocator
            .assign_custom("promo", "https://example.com", None)
            .await;

        assert!(matches!(result, Err(AppError::AlreadyTaken { code }) if code == "promo"));
    }
}
