//! Sentiment and alert-worthiness rules.
//!
//! Sentiment follows the star rating (4-5 positive, 3 neutral, 1-2 negative)
//! unless the caller passes a pre-classified sentiment, which is kept as is.

use serde::Serialize;

use crate::model::{Review, Sentiment, Urgency};

/// Output of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub urgency: Urgency,
    /// Whether the guest-recovery notifier should be considered.
    pub alert_worthy: bool,
}

/// Threshold rule: `>= 4` positive, `<= 2` negative, otherwise neutral.
pub fn sentiment_for_rating(rating: u8) -> Sentiment {
    match rating {
        r if r >= 4 => Sentiment::Positive,
        r if r <= 2 => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

/// Classify a review from its rating, an optional curated sentiment and its
/// urgency tag.
pub fn classify(rating: u8, sentiment_override: Option<Sentiment>, urgency: Urgency) -> Classification {
    let sentiment = sentiment_override.unwrap_or_else(|| sentiment_for_rating(rating));
    Classification {
        sentiment,
        urgency,
        alert_worthy: is_alert_worthy(rating, sentiment, urgency),
    }
}

/// True iff rating <= 2, sentiment is negative, or urgency is high/critical.
pub fn is_alert_worthy(rating: u8, sentiment: Sentiment, urgency: Urgency) -> bool {
    rating <= 2 || sentiment == Sentiment::Negative || urgency.is_escalated()
}

/// Alert predicate over a stored review. Spam gating is applied by the caller.
pub fn should_alert(review: &Review) -> bool {
    is_alert_worthy(review.rating, review.sentiment, review.urgency)
}

/// Spam reviews never require action.
pub fn requires_action(is_spam: bool, rating: u8, sentiment: Sentiment) -> bool {
    !is_spam && (rating <= 2 || sentiment == Sentiment::Negative)
}
