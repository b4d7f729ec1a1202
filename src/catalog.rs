//! Read side: property lookup, listings and dashboard aggregates.
//! Spam-flagged reviews never reach a statistic or a public listing.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::model::{Category, Property, Review};
use crate::query::{list_reviews, search_properties, ListFilters, Page};
use crate::stats::{
    compute_category_breakdown, compute_stats, mean_rating, rating_distribution, round_to,
    CategoryStat, Stats,
};
use crate::store::{ReviewFilter, Store};

#[derive(Debug, Clone, Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub review_count: usize,
    /// Live mean over non-spam reviews (two decimals), or the stored rating.
    pub computed_rating: f64,
    pub categories: BTreeMap<Category, CategoryStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyStats {
    pub property_id: String,
    pub total_reviews: usize,
    pub overall_rating: f64,
    pub distribution: BTreeMap<u8, usize>,
    pub categories: BTreeMap<Category, CategoryStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewListing {
    #[serde(flatten)]
    pub page: Page<Review>,
    /// Over every non-spam review of the property, not just this page.
    pub stats: Stats,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub property_count: usize,
    pub stats: Stats,
    pub urgent_count: usize,
    pub spam_count: usize,
    pub alert_count: usize,
}

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn search(&self, q: Option<&str>) -> AppResult<Vec<Property>> {
        let all = self.store.find_properties().await?;
        Ok(search_properties(&all, q))
    }

    pub async fn property_detail(&self, id: &str) -> AppResult<PropertyDetail> {
        let property = self.require_property(id).await?;
        let reviews = self.visible_reviews(id).await?;
        Ok(PropertyDetail {
            review_count: reviews.len(),
            computed_rating: live_rating(&property, &reviews),
            categories: compute_category_breakdown(&reviews, &Category::ALL),
            property,
        })
    }

    pub async fn property_stats(&self, id: &str) -> AppResult<PropertyStats> {
        let property = self.require_property(id).await?;
        let reviews = self.visible_reviews(id).await?;
        Ok(PropertyStats {
            property_id: property.id.clone(),
            total_reviews: reviews.len(),
            overall_rating: live_rating(&property, &reviews),
            distribution: rating_distribution(&reviews),
            categories: compute_category_breakdown(&reviews, &Category::ALL),
        })
    }

    pub async fn list_for_property(&self, filters: &ListFilters) -> AppResult<ReviewListing> {
        self.require_property(&filters.property_id).await?;
        let reviews = self.visible_reviews(&filters.property_id).await?;
        Ok(ReviewListing {
            page: list_reviews(&reviews, filters),
            stats: compute_stats(&reviews),
        })
    }

    /// Spam queue for moderators, newest first.
    pub async fn list_spam(&self) -> AppResult<Vec<Review>> {
        let mut out = self
            .store
            .find_reviews(&ReviewFilter::default().spam(true))
            .await?;
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    /// High and critical non-spam reviews: critical first, then newest first.
    pub async fn list_urgent(&self) -> AppResult<Vec<Review>> {
        let mut out = self
            .store
            .find_reviews(&ReviewFilter::default().spam(false).escalated())
            .await?;
        out.sort_by(|a, b| {
            b.urgency
                .cmp(&a.urgency)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(out)
    }

    pub async fn dashboard(&self) -> AppResult<Dashboard> {
        let properties = self.store.find_properties().await?;
        let visible = self
            .store
            .find_reviews(&ReviewFilter::default().spam(false))
            .await?;
        Ok(Dashboard {
            property_count: properties.len(),
            stats: compute_stats(&visible),
            urgent_count: visible.iter().filter(|r| r.urgency.is_escalated()).count(),
            spam_count: self
                .store
                .count_reviews(&ReviewFilter::default().spam(true))
                .await?,
            alert_count: self
                .store
                .count_reviews(&ReviewFilter::default().alert_sent(true))
                .await?,
        })
    }

    async fn require_property(&self, id: &str) -> AppResult<Property> {
        self.store
            .get_property(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("property '{id}'")))
    }

    async fn visible_reviews(&self, property_id: &str) -> AppResult<Vec<Review>> {
        self.store
            .find_reviews(&ReviewFilter::property(property_id).spam(false))
            .await
    }
}

fn live_rating(property: &Property, reviews: &[Review]) -> f64 {
    mean_rating(reviews).map_or(property.rating, |avg| round_to(avg, 2))
}
