//! In-process repositories.
//!
//! Used with `STORE_BACKEND=memory` and by the integration tests. State lives
//! behind a single `tokio::sync::RwLock` per repository, so the
//! check-and-insert in [`MemoryLinkRepository::create`] is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::entities::{
    ClickFact, NewReservedCode, NewShortLink, ReservedCode, ShortLink, ShortLinkPatch,
};
use crate::domain::repositories::{COUNTER_SHARDS, ClickRepository, LinkRepository};
use crate::error::AppError;

#[derive(Default)]
struct LinkState {
    next_id: i64,
    links: HashMap<String, ShortLink>,
    reserved: HashMap<String, ReservedCode>,
}

/// Link store backed by hash maps.
#[derive(Default)]
pub struct MemoryLinkRepository {
    state: RwLock<LinkState>,
}

impl MemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored links, active or not.
    pub async fn len(&self) -> usize {
        self.state.read().await.links.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LinkRepository for MemoryLinkRepository {
    async fn create(&self, new_link: NewShortLink) -> Result<ShortLink, AppError> {
        let mut state = self.state.write().await;

        if state.links.contains_key(&new_link.code) {
            return Err(AppError::AlreadyTaken {
                code: new_link.code,
            });
        }

        state.next_id += 1;
        let link = ShortLink::new(
            state.next_id,
            new_link.code,
            new_link.target_url,
            new_link.is_active,
            Utc::now(),
            new_link.expires_at,
        );
        state.links.insert(link.code.clone(), link.clone());

        Ok(link)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>, AppError> {
        Ok(self.state.read().await.links.get(code).cloned())
    }

    async fn update(&self, code: &str, patch: ShortLinkPatch) -> Result<ShortLink, AppError> {
        let mut state = self.state.write().await;
        let link = state.links.get_mut(code).ok_or_else(|| AppError::NotFound {
            code: code.to_string(),
        })?;

        patch.apply_to(link);
        Ok(link.clone())
    }

    async fn deactivate(&self, code: &str) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        let link = state.links.get_mut(code).ok_or_else(|| AppError::NotFound {
            code: code.to_string(),
        })?;

        link.is_active = false;
        Ok(())
    }

    async fn is_reserved(&self, code: &str) -> Result<bool, AppError> {
        Ok(self
            .state
            .read()
            .await
            .reserved
            .contains_key(&code.to_lowercase()))
    }

    async fn add_reserved(&self, reserved: NewReservedCode) -> Result<ReservedCode, AppError> {
        let mut state = self.state.write().await;
        let code = reserved.code.to_lowercase();
        let created_at = state
            .reserved
            .get(&code)
            .map_or_else(Utc::now, |existing| existing.created_at);

        let entry = ReservedCode {
            code: code.clone(),
            reason: reserved.reason,
            description: reserved.description,
            created_at,
        };
        state.reserved.insert(code, entry.clone());

        Ok(entry)
    }

    async fn list_reserved(&self) -> Result<Vec<ReservedCode>, AppError> {
        let mut codes: Vec<_> = self.state.read().await.reserved.values().cloned().collect();
        codes.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(codes)
    }

    async fn list_recent(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ShortLink>, AppError> {
        let state = self.state.read().await;
        let mut links: Vec<_> = state
            .links
            .values()
            .filter(|link| link.created_at >= since)
            .cloned()
            .collect();

        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        links.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(links)
    }

    async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let mut affected = 0;

        for link in state.links.values_mut() {
            if link.is_active && link.is_expired_at(now) {
                link.is_active = false;
                affected += 1;
            }
        }

        Ok(affected)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct ClickState {
    facts: Vec<ClickFact>,
    counters: HashMap<(i64, i16), i64>,
}

/// Click store backed by a vector of facts and a sharded counter map.
#[derive(Default)]
pub struct MemoryClickRepository {
    state: RwLock<ClickState>,
}

impl MemoryClickRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded facts, oldest first.
    pub async fn facts(&self) -> Vec<ClickFact> {
        self.state.read().await.facts.clone()
    }
}

#[async_trait]
impl ClickRepository for MemoryClickRepository {
    async fn record(&self, fact: ClickFact) -> Result<i64, AppError> {
        let mut state = self.state.write().await;
        state.facts.push(fact);
        Ok(state.facts.len() as i64)
    }

    async fn increment_counter(&self, link_id: i64) -> Result<(), AppError> {
        let shard: i16 = rand::random_range(0..COUNTER_SHARDS);
        *self
            .state
            .write()
            .await
            .counters
            .entry((link_id, shard))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn count(&self, link_id: i64) -> Result<i64, AppError> {
        let state = self.state.read().await;
        let sharded: i64 = state
            .counters
            .iter()
            .filter(|((id, _), _)| *id == link_id)
            .map(|(_, clicks)| clicks)
            .sum();

        Ok(sharded)
    }

    async fn last_clicked_at(&self, link_id: i64) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(self
            .state
            .read()
            .await
            .facts
            .iter()
            .filter(|fact| fact.link_id == link_id)
            .map(|fact| fact.occurred_at)
            .max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_duplicate_code_is_already_taken() {
        let repo = MemoryLinkRepository::new();
        repo.create(NewShortLink::active(
            "abcd123".to_string(),
            "https://a.example".to_string(),
            None,
        ))
        .await
        .unwrap();

        let result = repo
            .create(NewShortLink::active(
                "abcd123".to_string(),
                "https://b.example".to_string(),
                None,
            ))
            .await;

        assert!(matches!(result, Err(AppError::AlreadyTaken { .. })));
        assert_eq!(
            repo.find_by_code("abcd123").await.unwrap().unwrap().target_url,
            "https://a.example"
        );
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_same_code() {
        let repo = Arc::new(MemoryLinkRepository::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create(NewShortLink::active(
                    "race".to_string(),
                    format!("https://{i}.example"),
                    None,
                ))
                .await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_and_deactivate_missing_code() {
        let repo = MemoryLinkRepository::new();

        let update = repo.update("missing", ShortLinkPatch::default()).await;
        assert!(matches!(update, Err(AppError::NotFound { .. })));

        let deactivate = repo.deactivate("missing").await;
        assert!(matches!(deactivate, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_deactivate_expired_only_touches_expired_active_links() {
        let repo = MemoryLinkRepository::new();
        let past = Some(Utc::now() - Duration::hours(1));
        let future = Some(Utc::now() + Duration::hours(1));

        for (code, expires_at) in [("old1", past), ("old2", past), ("fresh", future), ("open", None)] {
            repo.create(NewShortLink::active(
                code.to_string(),
                "https://example.com".to_string(),
                expires_at,
            ))
            .await
            .unwrap();
        }
        repo.deactivate("old2").await.unwrap();

        let affected = repo.deactivate_expired(Utc::now()).await.unwrap();

        assert_eq!(affected, 1);
        assert!(!repo.find_by_code("old1").await.unwrap().unwrap().is_active);
        assert!(repo.find_by_code("fresh").await.unwrap().unwrap().is_active);
        assert!(repo.find_by_code("open").await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_reserved_codes_are_case_insensitive() {
        let repo = MemoryLinkRepository::new();
        repo.add_reserved(NewReservedCode::new("Status", "system", None))
            .await
            .unwrap();

        assert!(repo.is_reserved("status").await.unwrap());
        assert!(repo.is_reserved("STATUS").await.unwrap());
        assert!(!repo.is_reserved("other").await.unwrap());
        assert_eq!(repo.list_reserved().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_recent_respects_limit() {
        let repo = MemoryLinkRepository::new();
        for i in 0..5 {
            repo.create(NewShortLink::active(
                format!("code{i}"),
                "https://example.com".to_string(),
                None,
            ))
            .await
            .unwrap();
        }

        let recent = repo
            .list_recent(Utc::now() - Duration::days(7), 3)
            .await
            .unwrap();

        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].code, "code4");
    }

    #[tokio::test]
    async fn test_counters_sum_over_shards() {
        let repo = MemoryClickRepository::new();
        for _ in 0..10 {
            repo.increment_counter(7).await.unwrap();
        }
        repo.increment_counter(8).await.unwrap();

        assert_eq!(repo.count(7).await.unwrap(), 10);
        assert_eq!(repo.count(8).await.unwrap(), 1);
        assert_eq!(repo.count(9).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_last_clicked_at() {
        let repo = MemoryClickRepository::new();
        assert!(repo.last_clicked_at(1).await.unwrap().is_none());

        let earlier = Utc::now() - Duration::minutes(10);
        let later = Utc::now();
        repo.record(ClickFact::bare(1, later)).await.unwrap();
        repo.record(ClickFact::bare(1, earlier)).await.unwrap();

        assert_eq!(repo.last_clicked_at(1).await.unwrap(), Some(later));
    }
}
