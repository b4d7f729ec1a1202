//! # Aggregation
//! Pure statistics over a slice of reviews. Callers decide the scope
//! (property, spam exclusion) before calling in.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{Category, Review, Sentiment, Source};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    fn bump(&mut self, s: Sentiment) {
        match s {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
    }
}

/// Dashboard/listing statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_reviews: usize,
    /// Mean rating with one decimal, `"0.0"` when there are no reviews.
    pub average_rating: String,
    pub sentiment: SentimentCounts,
    pub by_source: BTreeMap<Source, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryStat {
    pub count: usize,
    /// Two decimals; `None` when the category has no reviews.
    pub avg_rating: Option<f64>,
}

pub fn compute_stats(reviews: &[Review]) -> Stats {
    let mut sentiment = SentimentCounts::default();
    for r in reviews {
        sentiment.bump(r.sentiment);
    }

    let average_rating = match mean_rating(reviews) {
        Some(avg) => format!("{:.1}", round_to(avg, 1)),
        None => "0.0".to_string(),
    };

    Stats {
        total_reviews: reviews.len(),
        average_rating,
        sentiment,
        by_source: count_by_source(reviews),
    }
}

pub fn count_by_source(reviews: &[Review]) -> BTreeMap<Source, usize> {
    let mut out = BTreeMap::new();
    for r in reviews {
        *out.entry(r.source).or_insert(0) += 1;
    }
    out
}

/// Count and average rating per requested category. A review tagged with
/// several categories counts toward each of them.
pub fn compute_category_breakdown(
    reviews: &[Review],
    categories: &[Category],
) -> BTreeMap<Category, CategoryStat> {
    categories
        .iter()
        .map(|&cat| {
            let (count, sum) = reviews
                .iter()
                .filter(|r| r.has_category(cat))
                .fold((0usize, 0u64), |(n, s), r| (n + 1, s + u64::from(r.rating)));
            let avg_rating = (count > 0).then(|| round_to(sum as f64 / count as f64, 2));
            (cat, CategoryStat { count, avg_rating })
        })
        .collect()
}

/// Number of reviews per star value, always with all five keys.
pub fn rating_distribution(reviews: &[Review]) -> BTreeMap<u8, usize> {
    let mut out: BTreeMap<u8, usize> = (1..=5).map(|k| (k, 0)).collect();
    for r in reviews {
        if let Some(slot) = out.get_mut(&r.rating) {
            *slot += 1;
        }
    }
    out
}

/// Arithmetic mean of ratings, `None` for an empty slice.
pub fn mean_rating(reviews: &[Review]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let sum: u64 = reviews.iter().map(|r| u64::from(r.rating)).sum();
    Some(sum as f64 / reviews.len() as f64)
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
