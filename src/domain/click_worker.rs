//! Background worker that persists click facts.
//!
//! Redirect handlers push [`ClickFact`]s into a bounded channel with
//! `try_send`; this worker drains it outside any request scope, so a client
//! disconnect never cancels a write. Each write is retried a bounded number of
//! times with exponential backoff, then logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, warn};

use crate::domain::entities::ClickFact;
use crate::domain::repositories::ClickRepository;

const RETRY_BASE_MILLIS: u64 = 10;
const RETRY_MAX_DELAY: Duration = Duration::from_secs(1);

/// Worker tuning.
#[derive(Debug, Clone, Copy)]
pub struct ClickWorkerSettings {
    /// Maximum number of facts written concurrently.
    pub concurrency: usize,
    /// Retries after the first failed write.
    pub retry_attempts: usize,
}

impl Default for ClickWorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry_attempts: 3,
        }
    }
}

/// Drains `rx` until every sender is dropped, then waits for in-flight writes.
pub async fn run_click_worker<C>(
    mut rx: mpsc::Receiver<ClickFact>,
    repository: Arc<C>,
    settings: ClickWorkerSettings,
) where
    C: ClickRepository + ?Sized + 'static,
{
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let mut in_flight = JoinSet::new();

    while let Some(fact) = rx.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        let repository = repository.clone();
        in_flight.spawn(async move {
            process_click(repository.as_ref(), fact, settings.retry_attempts).await;
            drop(permit);
        });

        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}

    info!("Click worker stopped");
}

/// Persists one fact, then bumps the sharded counter.
///
/// Counter failures never affect the primary record.
async fn process_click<C>(repository: &C, fact: ClickFact, retry_attempts: usize)
where
    C: ClickRepository + ?Sized,
{
    let link_id = fact.link_id;
    let strategy = ExponentialBackoff::from_millis(RETRY_BASE_MILLIS)
        .max_delay(RETRY_MAX_DELAY)
        .map(jitter)
        .take(retry_attempts);

    match Retry::spawn(strategy, || repository.record(fact.clone())).await {
        Ok(click_id) => {
            metrics::counter!("shortcode_clicks_recorded_total").increment(1);
            debug!(link_id, click_id, "Click recorded");

            if let Err(e) = repository.increment_counter(link_id).await {
                warn!(link_id, error = %e, "Click counter update skipped");
            }
        }
        Err(e) => {
            metrics::counter!("shortcode_clicks_failed_total").increment(1);
            error!(link_id, error = %e, "Failed to record click, dropping it");
        }
    }
}
