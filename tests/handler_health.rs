mod common;

use axum::{Router, routing::get};
use axum_test::TestServer;
use shortcode::api::handlers::health_handler;

fn make_server(ctx: &common::TestContext) -> TestServer {
    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(ctx.state.clone());

    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_endpoint_success() {
    let ctx = common::create_test_state();
    let server = make_server(&ctx);

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["checks"]["store"]["status"], "ok");
    assert_eq!(json["checks"]["click_queue"]["status"], "ok");
}

#[tokio::test]
async fn test_health_degraded_when_click_queue_closed() {
    let ctx = common::create_test_state();
    let server = make_server(&ctx);

    drop(ctx.click_rx);

    let response = server.get("/health").await;

    response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["store"]["status"], "ok");
    assert_eq!(json["checks"]["click_queue"]["status"], "error");
}
