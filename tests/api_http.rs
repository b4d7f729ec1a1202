// tests/api_http.rs
//
// HTTP-level tests for the Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    Router,
};
use http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt as _; // for `oneshot`

use review_sentinel::auth::{Role, SessionDirectory};
use review_sentinel::classify::SpamClassifier;
use review_sentinel::config::{IntakeLimits, NotifyConfig, SessionConfig};
use review_sentinel::model::Property;
use review_sentinel::notify::build_notifier;
use review_sentinel::store::{MemoryStore, Store};
use review_sentinel::{api, AppState};

const BODY_LIMIT: usize = 1024 * 1024;
const ASHA: &str = "tok-asha";
const BOB: &str = "tok-bob";

async fn test_router() -> Router {
    let store = Arc::new(MemoryStore::new());
    for (id, name, rating) in [("mh001", "W Marriott Juhu", 4.7), ("mh003", "JW Marriott Bangalore", 4.6)] {
        store
            .insert_property(Property {
                id: id.into(),
                name: name.into(),
                location: "India".into(),
                city: None,
                rating,
                tagline: None,
                badge: None,
            })
            .await
            .expect("seed property");
    }

    let sessions = SessionDirectory::from_config(&[
        SessionConfig {
            token: ASHA.into(),
            user_id: "u-asha".into(),
            name: "Asha".into(),
            role: Role::Manager,
        },
        SessionConfig {
            token: BOB.into(),
            user_id: "u-bob".into(),
            name: "Bob".into(),
            role: Role::Analyst,
        },
    ]);

    let state = AppState::new(
        store,
        build_notifier(&NotifyConfig::default()),
        Arc::new(SpamClassifier::default()),
        IntakeLimits::default(),
        sessions,
    );
    api::router(state)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(v) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string())),
        None => req.body(Body::empty()),
    }
    .expect("build request");

    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, v)
}

async fn submit(app: &Router, token: Option<&str>, rating: u8, text: &str) -> Value {
    let (status, v) = call(
        app,
        Method::POST,
        "/api/reviews",
        token,
        Some(json!({ "property_id": "mh001", "rating": rating, "text": text, "source": "google" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "submit failed: {v}");
    v
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_router().await;
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn submit_returns_created_review_with_flags() {
    let app = test_router().await;
    let v = submit(&app, None, 5, "Absolutely wonderful, best stay ever, perfect service!").await;

    assert_eq!(v["spam_detected"], false);
    assert_eq!(v["alert_sent"], false);
    assert_eq!(v["review"]["sentiment"], "positive");
    assert_eq!(v["review"]["source"], "google");
    assert_eq!(v["review"]["categories"], json!(["service"]));
    assert!(v["review"]["id"].as_str().is_some_and(|s| !s.is_empty()));
}

#[tokio::test]
async fn low_rating_alert_goes_through_demo_notifier() {
    let app = test_router().await;
    let (status, v) = call(
        &app,
        Method::POST,
        "/api/reviews",
        None,
        Some(json!({
            "property_id": "mh001",
            "rating": "1",
            "text": "Room was not cleaned for two days in a row.",
            "author_phone": "9876543210"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(v["alert_sent"], true);
    assert_eq!(v["deliveries"][0]["status"], "logged");
    assert_eq!(v["review"]["requires_action"], true);
}

#[tokio::test]
async fn camel_case_submission_reaches_the_notifier() {
    let app = test_router().await;
    let (status, v) = call(
        &app,
        Method::POST,
        "/api/reviews",
        None,
        Some(json!({
            "hotelId": "mh001",
            "rating": 2,
            "text": "Breakfast was cold and nobody at the desk helped.",
            "authorPhone": "9876543210"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{v}");
    assert_eq!(v["review"]["property_id"], "mh001");
    assert_eq!(v["alert_sent"], true);
}

#[tokio::test]
async fn validation_errors_name_the_field() {
    let app = test_router().await;
    let (status, v) = call(
        &app,
        Method::POST,
        "/api/reviews",
        None,
        Some(json!({ "property_id": "mh001", "rating": 9, "text": "Fine stay overall." })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(v["error"]["field"], "rating");

    let (status, v) = call(
        &app,
        Method::POST,
        "/api/reviews",
        None,
        Some(json!({ "property_id": "mh404", "rating": 3, "text": "Fine stay overall." })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = test_router().await;
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/reviews")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_sorts_and_paginates() {
    let app = test_router().await;
    for r in [3, 5, 1, 4, 2] {
        submit(&app, None, r, "A stay worth writing a few words about.").await;
    }

    let (status, v) = call(
        &app,
        Method::GET,
        "/api/properties/mh001/reviews?sort=rating_desc&offset=2&limit=2",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total"], 5);
    let ratings: Vec<u64> = v["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["rating"].as_u64().unwrap())
        .collect();
    assert_eq!(ratings, [3, 2]);
    assert_eq!(v["stats"]["total_reviews"], 5);
    assert_eq!(v["stats"]["average_rating"], "3.0");

    let (status, v) = call(
        &app,
        Method::GET,
        "/api/properties/mh001/reviews?sentiment=negative&source=all",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["total"], 2);

    let (status, v) = call(&app, Method::GET, "/api/properties/mh001/reviews?category=spa", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"]["field"], "category");
}

#[tokio::test]
async fn moderation_requires_a_session() {
    let app = test_router().await;
    let id = submit(&app, None, 3, "Average stay, nothing special to report.").await["review"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = call(&app, Method::GET, "/api/spam", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let uri = format!("/api/reviews/{id}/report-spam");
    let (status, _) = call(&app, Method::POST, &uri, Some("tok-unknown"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, v) = call(&app, Method::POST, &uri, Some(ASHA), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["is_spam"], true);
    assert_eq!(v["spam_reasons"], json!(["Manually reported by Asha"]));

    let (status, v) = call(&app, Method::GET, "/api/spam", Some(BOB), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v.as_array().unwrap().len(), 1);

    // spam disappears from the public listing
    let (_, v) = call(&app, Method::GET, "/api/properties/mh001/reviews", None, None).await;
    assert_eq!(v["total"], 0);

    let uri = format!("/api/reviews/{id}/unmark-spam");
    let (status, v) = call(&app, Method::POST, &uri, Some(BOB), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["is_spam"], false);
}

#[tokio::test]
async fn delete_is_owner_only() {
    let app = test_router().await;
    let id = submit(&app, Some(ASHA), 4, "Great pool and a friendly concierge team.").await["review"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/reviews/{id}");

    let (status, _) = call(&app, Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, v) = call(&app, Method::DELETE, &uri, Some(BOB), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(v["error"]["code"], "FORBIDDEN");

    let (status, _) = call(&app, Method::DELETE, &uri, Some(ASHA), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, Method::DELETE, &uri, Some(ASHA), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn properties_search_detail_and_stats() {
    let app = test_router().await;
    submit(&app, None, 2, "Check-in took more than an hour today.").await;

    let (status, v) = call(&app, Method::GET, "/api/properties?q=bangalore", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v.as_array().unwrap().len(), 1);
    assert_eq!(v[0]["id"], "mh003");

    let (status, v) = call(&app, Method::GET, "/api/properties/mh001", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["review_count"], 1);
    assert_eq!(v["rating"], 2.0);
    assert_eq!(v["categories"]["service"]["count"], 1);
    assert_eq!(v["categories"]["food"]["avg_rating"], Value::Null);

    let (status, v) = call(&app, Method::GET, "/api/properties/mh003/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["overall_rating"], 4.6);
    assert_eq!(v["distribution"]["5"], 0);

    let (status, _) = call(&app, Method::GET, "/api/properties/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn alerts_and_dashboard() {
    let app = test_router().await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/reviews",
        None,
        Some(json!({
            "property_id": "mh001",
            "rating": 4,
            "text": "Lovely stay, but the AC failed during the night.",
            "urgency": "critical",
            "urgency_reason": "room unusable"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    submit(&app, None, 5, "Lovely rooms and a very warm welcome.").await;

    let (status, v) = call(&app, Method::GET, "/api/alerts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v.as_array().unwrap().len(), 1);
    assert_eq!(v[0]["urgency"], "critical");
    let id = v[0]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::POST, "/api/alerts/send", None, Some(json!({ "review_id": id }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, v) = call(
        &app,
        Method::POST,
        "/api/alerts/send",
        Some(ASHA),
        Some(json!({ "reviewId": id, "guestPhone": "9876543210" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["alert_sent"], true);

    let (status, v) = call(&app, Method::GET, "/api/dashboard", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["property_count"], 2);
    assert_eq!(v["stats"]["total_reviews"], 2);
    assert_eq!(v["urgent_count"], 1);
    assert_eq!(v["spam_count"], 0);
    assert_eq!(v["alert_count"], 1);
}
