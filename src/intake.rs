//! Review intake: validate, classify, persist, recompute the property
//! rating, then alert the guest.
//!
//! Writes that touch a property's aggregate rating are serialised per
//! property through [`PropertyLocks`]. The notifier runs after the lock is
//! released so a slow provider never holds up other submissions.

use chrono::Utc;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::auth::Principal;
use crate::classify::{classify, requires_action, should_alert, SpamClassifier};
use crate::config::IntakeLimits;
use crate::error::{AppError, AppResult};
use crate::logging::anon_id;
use crate::model::{Category, Review, Sentiment, Source, Urgency};
use crate::notify::{any_dispatched, Delivery, GuestAlert, Notifier};
use crate::stats::{mean_rating, round_to};
use crate::store::{ReviewFilter, ReviewPatch, Store};

/// Keyed async mutex, one per property id.
#[derive(Debug, Default)]
pub struct PropertyLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PropertyLocks {
    pub async fn acquire(&self, property_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(property_id.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

/// Raw submission as received from a client. Everything is optional here so
/// validation can report the first missing field itself. Keys are snake_case;
/// camelCase spellings are accepted too.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitReview {
    #[serde(default, alias = "propertyId", alias = "hotel_id", alias = "hotelId")]
    pub property_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Number or numeric string.
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "authorPhone")]
    pub author_phone: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default, alias = "urgencyReason")]
    pub urgency_reason: Option<String>,
    #[serde(default, alias = "festivalTag")]
    pub festival_tag: Option<String>,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReview {
    pub property_id: String,
    pub text: String,
    pub rating: u8,
    pub author: String,
    pub author_phone: Option<String>,
    pub source: Source,
    pub categories: Vec<Category>,
    pub sentiment: Option<Sentiment>,
    pub urgency: Urgency,
    pub urgency_reason: Option<String>,
    pub festival_tag: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub review: Review,
    pub spam_detected: bool,
    pub spam_reasons: Vec<String>,
    pub alert_sent: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deliveries: Vec<Delivery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertOutcome {
    pub review: Review,
    pub alert_sent: bool,
    pub deliveries: Vec<Delivery>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_rating(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_field<T>(field: &'static str, raw: Option<String>) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_blank(raw) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: T::Err| AppError::validation(field, e.to_string())),
    }
}

/// Fail-fast validation. Pure: no store access and no side effects.
pub fn validate(
    input: SubmitReview,
    limits: &IntakeLimits,
    principal: Option<&Principal>,
) -> AppResult<ValidReview> {
    let property_id = non_blank(input.property_id)
        .ok_or_else(|| AppError::validation("property_id", "is required"))?;
    let text = input
        .text
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::validation("text", "is required"))?;
    let raw_rating = input
        .rating
        .filter(|v| !v.is_null())
        .ok_or_else(|| AppError::validation("rating", "is required"))?;

    let rating = parse_rating(&raw_rating)
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| AppError::validation("rating", "must be an integer between 1 and 5"))?
        as u8;

    let text = text.trim().to_string();
    let len = text.chars().count();
    if len < limits.text_min {
        return Err(AppError::validation(
            "text",
            format!("must be at least {} characters", limits.text_min),
        ));
    }
    if len > limits.text_max {
        return Err(AppError::validation(
            "text",
            format!("must be at most {} characters", limits.text_max),
        ));
    }

    let mut categories: Vec<Category> = Vec::new();
    let listed = input.categories.unwrap_or_default();
    let raw_categories = if listed.is_empty() {
        input.category.into_iter().collect()
    } else {
        listed
    };
    for raw in raw_categories {
        if let Some(c) = parse_field::<Category>("category", Some(raw))? {
            if !categories.contains(&c) {
                categories.push(c);
            }
        }
    }
    if categories.is_empty() {
        categories.push(limits.default_category);
    }

    let source = parse_field::<Source>("source", input.source)?.unwrap_or(limits.default_source);
    let sentiment = parse_field::<Sentiment>("sentiment", input.sentiment)?;
    let urgency = parse_field::<Urgency>("urgency", input.urgency)?.unwrap_or_default();

    let author = non_blank(input.author)
        .or_else(|| principal.map(|p| p.name.clone()))
        .unwrap_or_else(|| limits.default_author.clone());

    Ok(ValidReview {
        property_id,
        text,
        rating,
        author,
        author_phone: non_blank(input.author_phone),
        source,
        categories,
        sentiment,
        urgency,
        urgency_reason: non_blank(input.urgency_reason),
        festival_tag: non_blank(input.festival_tag),
    })
}

/// Write side of the review store.
pub struct ReviewIntake {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    spam: Arc<SpamClassifier>,
    limits: IntakeLimits,
    locks: PropertyLocks,
}

impl ReviewIntake {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        spam: Arc<SpamClassifier>,
        limits: IntakeLimits,
    ) -> Self {
        Self {
            store,
            notifier,
            spam,
            limits,
            locks: PropertyLocks::default(),
        }
    }

    pub async fn submit(
        &self,
        input: SubmitReview,
        principal: Option<&Principal>,
    ) -> AppResult<SubmitOutcome> {
        let started = Instant::now();
        let v = validate(input, &self.limits, principal)?;

        let property = self
            .store
            .get_property(&v.property_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("property '{}'", v.property_id)))?;

        let verdict = self.spam.classify(&v.text, v.rating);
        let class = classify(v.rating, v.sentiment, v.urgency);
        let review = Review {
            id: uuid::Uuid::new_v4().to_string(),
            property_id: property.id.clone(),
            property_name: property.name.clone(),
            user_id: principal.map(|p| p.id.clone()),
            author: v.author,
            author_phone: v.author_phone,
            rating: v.rating,
            text: v.text,
            source: v.source,
            categories: v.categories,
            sentiment: class.sentiment,
            urgency: class.urgency,
            urgency_reason: v.urgency_reason,
            festival_tag: v.festival_tag,
            requires_action: requires_action(verdict.is_spam, v.rating, class.sentiment),
            is_spam: verdict.is_spam,
            spam_reasons: verdict.reasons.clone(),
            alert_sent: false,
            alert_sent_at: None,
            created_at: Utc::now(),
        };

        let mut stored = {
            let _guard = self.locks.acquire(&property.id).await;
            let stored = self.store.insert_review(review).await?;
            self.recompute_rating(&property.id).await?;
            stored
        };

        counter!("reviews_submitted_total").increment(1);
        if verdict.is_spam {
            counter!("reviews_spam_total").increment(1);
            info!(
                target: "intake",
                review = %stored.id,
                property = %stored.property_id,
                reasons = ?verdict.reasons,
                "review flagged as spam"
            );
        }

        let mut deliveries = Vec::new();
        if !stored.is_spam && should_alert(&stored) {
            let name = Some(stored.author.clone());
            deliveries = self
                .dispatch(stored.author_phone.clone(), name, &stored.property_name, stored.rating)
                .await;
            if any_dispatched(&deliveries) {
                stored = self.mark_alert_sent(stored).await;
            }
        }

        histogram!("review_intake_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            target: "intake",
            review = %stored.id,
            property = %stored.property_id,
            rating = stored.rating,
            sentiment = %stored.sentiment,
            spam = stored.is_spam,
            alert_sent = stored.alert_sent,
            "review accepted"
        );

        Ok(SubmitOutcome {
            spam_detected: verdict.is_spam,
            spam_reasons: verdict.reasons,
            alert_sent: stored.alert_sent,
            deliveries,
            review: stored,
        })
    }

    /// Flag a review as spam on behalf of `reporter`. Repeating the call
    /// replaces the reasons with the latest reporter's message.
    pub async fn mark_spam(&self, review_id: &str, reporter: &Principal) -> AppResult<Review> {
        let reasons = vec![format!("Manually reported by {}", reporter.name)];
        let review = self.set_spam(review_id, true, reasons).await?;
        info!(target: "intake", review = %review.id, by = %reporter.id, "review marked as spam");
        Ok(review)
    }

    pub async fn unmark_spam(&self, review_id: &str) -> AppResult<Review> {
        let review = self.set_spam(review_id, false, Vec::new()).await?;
        info!(target: "intake", review = %review.id, "review restored from spam");
        Ok(review)
    }

    /// Only the authoring account may delete its review.
    pub async fn delete_review(&self, review_id: &str, requester: &Principal) -> AppResult<()> {
        let review = self.require_review(review_id).await?;
        if review.user_id.as_deref() != Some(requester.id.as_str()) {
            warn!(
                target: "intake",
                review = %review.id,
                requester = %requester.id,
                "delete refused: not the author"
            );
            return Err(AppError::Forbidden("only the author can delete this review".into()));
        }

        let _guard = self.locks.acquire(&review.property_id).await;
        if !self.store.delete_review(review_id).await? {
            return Err(AppError::NotFound(format!("review '{review_id}'")));
        }
        self.recompute_rating(&review.property_id).await?;
        counter!("reviews_deleted_total").increment(1);
        info!(target: "intake", review = %review.id, property = %review.property_id, "review deleted");
        Ok(())
    }

    /// Explicit (re-)send from moderation. Supplied contact details take
    /// precedence over the ones stored on the review.
    pub async fn send_alert(
        &self,
        review_id: &str,
        phone: Option<String>,
        name: Option<String>,
    ) -> AppResult<AlertOutcome> {
        let review = self.require_review(review_id).await?;
        let property_name = match self.store.get_property(&review.property_id).await? {
            Some(p) => p.name,
            None if !review.property_name.is_empty() => review.property_name.clone(),
            None => review.property_id.clone(),
        };

        let phone = non_blank(phone).or_else(|| review.author_phone.clone());
        let name = non_blank(name).or_else(|| Some(review.author.clone()));
        let deliveries = self.dispatch(phone, name, &property_name, review.rating).await;

        let alert_sent = any_dispatched(&deliveries);
        let review = if alert_sent {
            self.mark_alert_sent(review).await
        } else {
            review
        };
        Ok(AlertOutcome {
            review,
            alert_sent,
            deliveries,
        })
    }

    async fn require_review(&self, review_id: &str) -> AppResult<Review> {
        self.store
            .get_review(review_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("review '{review_id}'")))
    }

    async fn set_spam(&self, review_id: &str, is_spam: bool, reasons: Vec<String>) -> AppResult<Review> {
        let review = self.require_review(review_id).await?;
        let _guard = self.locks.acquire(&review.property_id).await;
        let updated = self
            .store
            .update_review(review_id, ReviewPatch::spam(is_spam, reasons))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("review '{review_id}'")))?;
        self.recompute_rating(&updated.property_id).await?;
        Ok(updated)
    }

    /// Full recompute over the property's non-spam reviews, one decimal.
    /// With no reviews left the current rating is kept.
    async fn recompute_rating(&self, property_id: &str) -> AppResult<Option<f64>> {
        let reviews = self
            .store
            .find_reviews(&ReviewFilter::property(property_id).spam(false))
            .await?;
        let Some(avg) = mean_rating(&reviews) else {
            debug!(target: "intake", property = %property_id, "no reviews, rating kept");
            return Ok(None);
        };
        let rating = round_to(avg, 1);
        self.store.update_property_rating(property_id, rating).await?;
        debug!(target: "intake", property = %property_id, rating, n = reviews.len(), "rating recomputed");
        Ok(Some(rating))
    }

    async fn dispatch(
        &self,
        phone: Option<String>,
        name: Option<String>,
        property_name: &str,
        rating: u8,
    ) -> Vec<Delivery> {
        let deliveries = match phone {
            Some(phone) => {
                debug!(target: "notify", to = %anon_id(&phone), provider = self.notifier.name(), "sending guest alert");
                let alert = GuestAlert {
                    phone,
                    name,
                    property_name: property_name.to_string(),
                    rating,
                };
                self.notifier.send_guest_alert(&alert).await
            }
            None => vec![Delivery::failed("none", "no contact phone")],
        };
        for d in &deliveries {
            counter!("guest_alerts_total", "status" => d.status.as_str()).increment(1);
            if d.status == crate::notify::DeliveryStatus::Failed {
                warn!(
                    target: "notify",
                    channel = %d.channel,
                    detail = d.detail.as_deref().unwrap_or(""),
                    "guest alert not delivered"
                );
            }
        }
        deliveries
    }

    /// Best effort: the alert already went out, so a failed patch is logged
    /// and the in-memory copy is updated for the response.
    async fn mark_alert_sent(&self, mut review: Review) -> Review {
        let now = Utc::now();
        match self
            .store
            .update_review(&review.id, ReviewPatch::alert_sent_at(now))
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                warn!(target: "intake", review = %review.id, "review vanished before alert flag was stored");
                review.alert_sent = true;
                review.alert_sent_at = Some(now);
                review
            }
            Err(e) => {
                warn!(target: "intake", review = %review.id, error = %e, "failed to store alert flag");
                review.alert_sent = true;
                review.alert_sent_at = Some(now);
                review
            }
        }
    }
}
