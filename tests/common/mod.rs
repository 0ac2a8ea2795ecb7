#![allow(dead_code)]

use axum::extract::ConnectInfo;
use chrono::{Duration, Utc};
use shortcode::application::services::{ClickPolicy, ClickTracker, LinkService};
use shortcode::config::ShortenerSettings;
use shortcode::domain::entities::{ClickFact, NewShortLink, ShortLink};
use shortcode::domain::repositories::{ClickRepository, LinkRepository};
use shortcode::infrastructure::persistence::{MemoryClickRepository, MemoryLinkRepository};
use shortcode::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::mpsc;
use tower::Layer;

pub const BASE_URL: &str = "https://s.example.com";
pub const PEER_ADDR: &str = "127.0.0.1:12345";

pub struct TestContext {
    pub state: AppState,
    pub links: Arc<MemoryLinkRepository>,
    pub clicks: Arc<MemoryClickRepository>,
    pub click_rx: mpsc::Receiver<ClickFact>,
}

pub fn create_test_state() -> TestContext {
    create_test_state_with(ShortenerSettings::default())
}

pub fn create_test_state_with(settings: ShortenerSettings) -> TestContext {
    let links = Arc::new(MemoryLinkRepository::new());
    let clicks = Arc::new(MemoryClickRepository::new());
    let (click_tx, click_rx) = mpsc::channel(100);

    let link_repository: Arc<dyn LinkRepository> = links.clone();
    let click_repository: Arc<dyn ClickRepository> = clicks.clone();

    let service = LinkService::new(
        link_repository,
        click_repository,
        ClickTracker::new(click_tx, ClickPolicy::from(&settings)),
        &settings,
        StdDuration::from_secs(2),
    )
    .unwrap();

    TestContext {
        state: AppState::new(Arc::new(service), BASE_URL),
        links,
        clicks,
        click_rx,
    }
}

pub async fn create_test_link(links: &MemoryLinkRepository, code: &str, url: &str) -> ShortLink {
    links
        .create(NewShortLink::active(code.to_string(), url.to_string(), None))
        .await
        .unwrap()
}

pub async fn create_inactive_link(links: &MemoryLinkRepository, code: &str, url: &str) {
    create_test_link(links, code, url).await;
    links.deactivate(code).await.unwrap();
}

pub async fn create_expired_link(links: &MemoryLinkRepository, code: &str, url: &str) {
    links
        .create(NewShortLink::active(
            code.to_string(),
            url.to_string(),
            Some(Utc::now() - Duration::hours(1)),
        ))
        .await
        .unwrap();
}

/// Inserts a fixed peer address, as `into_make_service_with_connect_info` would.
#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = PEER_ADDR.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}
