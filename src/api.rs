//! HTTP surface. Handlers stay thin: parse, call intake/catalog, serialise.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::auth::{AuthPrincipal, SessionDirectory};
use crate::catalog::{Catalog, Dashboard, PropertyDetail, PropertyStats, ReviewListing};
use crate::classify::SpamClassifier;
use crate::config::{AppConfig, IntakeLimits};
use crate::error::{AppError, AppResult};
use crate::intake::{AlertOutcome, ReviewIntake, SubmitOutcome, SubmitReview};
use crate::metrics::Metrics;
use crate::model::{Property, Review};
use crate::notify::{build_notifier, Notifier};
use crate::query::{parse_criterion, ListFilters, SortKey};
use crate::store::{MemoryStore, Store};

pub const ENV_DEBUG_ROUTES: &str = "DEBUG_ROUTES";

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<ReviewIntake>,
    pub catalog: Catalog,
    pub sessions: Arc<SessionDirectory>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        spam: Arc<SpamClassifier>,
        limits: IntakeLimits,
        sessions: SessionDirectory,
    ) -> Self {
        Self {
            intake: Arc::new(ReviewIntake::new(store.clone(), notifier, spam, limits)),
            catalog: Catalog::new(store),
            sessions: Arc::new(sessions),
        }
    }

    /// Build the store, notifier and classifier from config and import the
    /// configured properties that are not in the store yet.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match &cfg.store.snapshot_path {
            Some(path) => Arc::new(MemoryStore::with_snapshot(path)?),
            None => Arc::new(MemoryStore::new()),
        };

        let mut imported = 0usize;
        for p in &cfg.properties {
            match store.insert_property(p.clone()).await {
                Ok(_) => imported += 1,
                Err(AppError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let spam = Arc::new(SpamClassifier::new(cfg.spam.clone())?);
        let notifier = build_notifier(&cfg.notify);
        let sessions = SessionDirectory::from_config(&cfg.sessions);
        info!(
            target: "api",
            imported,
            sessions = sessions.len(),
            notifier = notifier.name(),
            "state ready"
        );

        Ok(Self::new(store, notifier, spam, cfg.intake.clone(), sessions))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/properties", get(search_properties))
        .route("/api/properties/{id}", get(property_detail))
        .route("/api/properties/{id}/reviews", get(list_property_reviews))
        .route("/api/properties/{id}/stats", get(property_stats))
        .route("/api/reviews", post(submit_review))
        .route("/api/reviews/{id}", delete(delete_review))
        .route("/api/reviews/{id}/report-spam", post(report_spam))
        .route("/api/reviews/{id}/unmark-spam", post(unmark_spam))
        .route("/api/spam", get(list_spam))
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/send", post(send_alert))
        .route("/api/dashboard", get(dashboard))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Full app as the binary serves it: config from disk/env, plus `/metrics`
/// when `DEBUG_ROUTES=1`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load()?;
    let state = AppState::from_config(&cfg).await?;
    let mut app = router(state);

    if std::env::var(ENV_DEBUG_ROUTES).ok().as_deref() == Some("1") {
        let metrics = Metrics::init()?;
        app = app.merge(metrics.router());
        info!(target: "api", "debug routes enabled (/metrics)");
    }
    Ok(app)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    body.map(|Json(v)| v)
        .map_err(|e| AppError::validation("body", e.body_text()))
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

async fn search_properties(
    State(s): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<Property>>> {
    Ok(Json(s.catalog.search(q.q.as_deref()).await?))
}

async fn property_detail(
    State(s): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PropertyDetail>> {
    Ok(Json(s.catalog.property_detail(&id).await?))
}

async fn property_stats(
    State(s): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PropertyStats>> {
    Ok(Json(s.catalog.property_stats(&id).await?))
}

/// Raw listing parameters; parsed into [`ListFilters`] so bad values come
/// back as field-level validation errors.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    source: Option<String>,
    sentiment: Option<String>,
    category: Option<String>,
    sort: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

impl ListQuery {
    fn into_filters(self, property_id: String) -> AppResult<ListFilters> {
        let mut f = ListFilters::for_property(property_id);
        f.source = parse_criterion("source", self.source.as_deref())?;
        f.sentiment = parse_criterion("sentiment", self.sentiment.as_deref())?;
        f.category = parse_criterion("category", self.category.as_deref())?;
        f.sort = SortKey::parse_lenient(self.sort.as_deref());
        if let Some(limit) = parse_criterion::<usize>("limit", self.limit.as_deref())? {
            f.limit = limit;
        }
        if let Some(offset) = parse_criterion::<usize>("offset", self.offset.as_deref())? {
            f.offset = offset;
        }
        Ok(f)
    }
}

async fn list_property_reviews(
    State(s): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<ReviewListing>> {
    let filters = q.into_filters(id)?;
    Ok(Json(s.catalog.list_for_property(&filters).await?))
}

async fn submit_review(
    State(s): State<AppState>,
    principal: Option<AuthPrincipal>,
    body: Result<Json<SubmitReview>, JsonRejection>,
) -> AppResult<(StatusCode, Json<SubmitOutcome>)> {
    let input = json_body(body)?;
    let principal = principal.map(|AuthPrincipal(p)| p);
    let outcome = s.intake.submit(input, principal.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn delete_review(
    State(s): State<AppState>,
    AuthPrincipal(p): AuthPrincipal,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    s.intake.delete_review(&id, &p).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn report_spam(
    State(s): State<AppState>,
    AuthPrincipal(p): AuthPrincipal,
    Path(id): Path<String>,
) -> AppResult<Json<Review>> {
    Ok(Json(s.intake.mark_spam(&id, &p).await?))
}

async fn unmark_spam(
    State(s): State<AppState>,
    AuthPrincipal(_): AuthPrincipal,
    Path(id): Path<String>,
) -> AppResult<Json<Review>> {
    Ok(Json(s.intake.unmark_spam(&id).await?))
}

async fn list_spam(
    State(s): State<AppState>,
    AuthPrincipal(_): AuthPrincipal,
) -> AppResult<Json<Vec<Review>>> {
    Ok(Json(s.catalog.list_spam().await?))
}

async fn list_alerts(State(s): State<AppState>) -> AppResult<Json<Vec<Review>>> {
    Ok(Json(s.catalog.list_urgent().await?))
}

#[derive(Debug, Deserialize)]
struct SendAlertReq {
    #[serde(alias = "reviewId")]
    review_id: String,
    #[serde(default, alias = "guestPhone")]
    guest_phone: Option<String>,
    #[serde(default, alias = "guestName")]
    guest_name: Option<String>,
}

async fn send_alert(
    State(s): State<AppState>,
    AuthPrincipal(p): AuthPrincipal,
    body: Result<Json<SendAlertReq>, JsonRejection>,
) -> AppResult<Json<AlertOutcome>> {
    let req = json_body(body)?;
    info!(target: "api", review = %req.review_id, by = %p.id, "manual guest alert");
    let out = s
        .intake
        .send_alert(&req.review_id, req.guest_phone, req.guest_name)
        .await?;
    Ok(Json(out))
}

async fn dashboard(State(s): State<AppState>) -> AppResult<Json<Dashboard>> {
    Ok(Json(s.catalog.dashboard().await?))
}
