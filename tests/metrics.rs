// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serial_test::serial;
use tower::ServiceExt;

// Build the full in-process app (includes /metrics when gated via env).
async fn build_app() -> Router {
    std::env::set_var("DEBUG_ROUTES", "1");
    std::env::set_var("REVIEW_CONFIG_PATH", "config/review_sentinel.toml");
    std::env::remove_var("REVIEW_SNAPSHOT_PATH");
    std::env::remove_var("REVIEW_NOTIFIER");
    review_sentinel::app()
        .await
        .expect("app() should build Router in tests")
}

#[tokio::test]
#[serial]
async fn metrics_endpoint_reports_intake_series() {
    let app = build_app().await;

    let submit = Request::post("/api/reviews")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"property_id":"mh001","rating":2,"text":"Slow room service and a noisy corridor.","author_phone":"9876543210"}"#,
        ))
        .unwrap();
    let resp = app.clone().oneshot(submit).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "reviews_submitted_total",
        "guest_alerts_total",
        "review_intake_ms",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
}

#[tokio::test]
#[serial]
async fn metrics_route_is_hidden_without_debug_flag() {
    std::env::remove_var("DEBUG_ROUTES");
    std::env::set_var("REVIEW_CONFIG_PATH", "config/review_sentinel.toml");
    let app = review_sentinel::app().await.unwrap();
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
