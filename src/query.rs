//! Listing filters, sorting and pagination over in-memory review sets.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AppError;
use crate::model::{Category, Property, Review, Sentiment, Source};

pub const DEFAULT_PAGE_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    DateDesc,
    RatingDesc,
    RatingAsc,
}

impl SortKey {
    /// Unknown keys fall back to newest first.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("rating_desc") => Self::RatingDesc,
            Some("rating_asc") => Self::RatingAsc,
            _ => Self::DateDesc,
        }
    }
}

/// Listing request for one property. `None` criteria are no-ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilters {
    pub property_id: String,
    pub source: Option<Source>,
    pub sentiment: Option<Sentiment>,
    pub category: Option<Category>,
    pub sort: SortKey,
    pub limit: usize,
    pub offset: usize,
}

impl ListFilters {
    pub fn for_property(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            source: None,
            sentiment: None,
            category: None,
            sort: SortKey::default(),
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }

    fn matches(&self, r: &Review) -> bool {
        r.property_id == self.property_id
            && !r.is_spam
            && self.source.map_or(true, |s| r.source == s)
            && self.sentiment.map_or(true, |s| r.sentiment == s)
            && self.category.map_or(true, |c| r.has_category(c))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Matches before pagination.
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub items: Vec<T>,
}

/// Parse an optional query criterion; absent, empty and `"all"` mean "no filter".
pub fn parse_criterion<T>(field: &'static str, raw: Option<&str>) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::validation(field, e.to_string())),
    }
}

/// Filter (AND across criteria, spam always excluded), sort, then paginate.
pub fn list_reviews(reviews: &[Review], filters: &ListFilters) -> Page<Review> {
    let mut matched: Vec<&Review> = reviews.iter().filter(|r| filters.matches(r)).collect();

    match filters.sort {
        SortKey::DateDesc => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortKey::RatingDesc => matched.sort_by(|a, b| b.rating.cmp(&a.rating)),
        SortKey::RatingAsc => matched.sort_by(|a, b| a.rating.cmp(&b.rating)),
    }

    let total = matched.len();
    let items = matched
        .into_iter()
        .skip(filters.offset)
        .take(filters.limit)
        .cloned()
        .collect();

    Page {
        total,
        limit: filters.limit,
        offset: filters.offset,
        items,
    }
}

/// Case-insensitive substring search over name, location and city, sorted by name.
pub fn search_properties(properties: &[Property], q: Option<&str>) -> Vec<Property> {
    let needle = q.map(|s| s.trim().to_lowercase()).unwrap_or_default();
    let mut out: Vec<Property> = properties
        .iter()
        .filter(|p| {
            needle.is_empty()
                || p.name.to_lowercase().contains(&needle)
                || p.location.to_lowercase().contains(&needle)
                || p
                    .city
                    .as_deref()
                    .is_some_and(|c| c.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}
