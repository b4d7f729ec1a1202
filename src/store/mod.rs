// src/store/mod.rs
//! Persistence seam. The core talks to an abstract [`Store`]; the bundled
//! [`MemoryStore`] keeps everything in memory with optional JSON snapshots.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::model::{Property, Review};

pub use crate::store::memory::MemoryStore;

/// Review selection used by `find_reviews` / `count_reviews`.
/// Every `Some`/`true` field narrows the match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewFilter {
    pub property_id: Option<String>,
    pub is_spam: Option<bool>,
    pub alert_sent: Option<bool>,
    /// Only high/critical urgency.
    pub escalated_only: bool,
}

impl ReviewFilter {
    pub fn property(id: impl Into<String>) -> Self {
        Self {
            property_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn spam(mut self, is_spam: bool) -> Self {
        self.is_spam = Some(is_spam);
        self
    }

    pub fn alert_sent(mut self, sent: bool) -> Self {
        self.alert_sent = Some(sent);
        self
    }

    pub fn escalated(mut self) -> Self {
        self.escalated_only = true;
        self
    }

    pub fn matches(&self, r: &Review) -> bool {
        self.property_id.as_deref().map_or(true, |p| r.property_id == p)
            && self.is_spam.map_or(true, |s| r.is_spam == s)
            && self.alert_sent.map_or(true, |a| r.alert_sent == a)
            && (!self.escalated_only || r.urgency.is_escalated())
    }
}

/// Partial review update. Only moderation and alert fields are patchable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewPatch {
    pub is_spam: Option<bool>,
    pub spam_reasons: Option<Vec<String>>,
    pub alert_sent: Option<bool>,
    pub alert_sent_at: Option<DateTime<Utc>>,
}

impl ReviewPatch {
    pub fn spam(is_spam: bool, reasons: Vec<String>) -> Self {
        Self {
            is_spam: Some(is_spam),
            spam_reasons: Some(reasons),
            ..Self::default()
        }
    }

    pub fn alert_sent_at(at: DateTime<Utc>) -> Self {
        Self {
            alert_sent: Some(true),
            alert_sent_at: Some(at),
            ..Self::default()
        }
    }

    pub fn apply(self, r: &mut Review) {
        if let Some(v) = self.is_spam {
            r.is_spam = v;
        }
        if let Some(v) = self.spam_reasons {
            r.spam_reasons = v;
        }
        if let Some(v) = self.alert_sent {
            r.alert_sent = v;
        }
        if let Some(v) = self.alert_sent_at {
            r.alert_sent_at = Some(v);
        }
    }
}

/// Document-store style persistence. No multi-record transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_properties(&self) -> AppResult<Vec<Property>>;
    async fn get_property(&self, id: &str) -> AppResult<Option<Property>>;
    /// Fails with `Conflict` when the id is taken.
    async fn insert_property(&self, property: Property) -> AppResult<Property>;
    async fn update_property_rating(&self, id: &str, rating: f64) -> AppResult<Option<Property>>;

    async fn find_reviews(&self, filter: &ReviewFilter) -> AppResult<Vec<Review>>;
    async fn get_review(&self, id: &str) -> AppResult<Option<Review>>;
    /// Fails with `Conflict` when the id is taken.
    async fn insert_review(&self, review: Review) -> AppResult<Review>;
    async fn update_review(&self, id: &str, patch: ReviewPatch) -> AppResult<Option<Review>>;
    async fn delete_review(&self, id: &str) -> AppResult<bool>;
    async fn count_reviews(&self, filter: &ReviewFilter) -> AppResult<usize>;
}
