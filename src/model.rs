//! Domain entities: properties (hotels/resorts), reviews and the small
//! closed vocabularies attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Derived opinion of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// Severity tag marking reviews that need expedited guest recovery.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    None,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// High or critical.
    pub fn is_escalated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Channel a review was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Internal,
    Google,
    Tripadvisor,
    Makemytrip,
    #[serde(rename = "booking.com", alias = "booking")]
    Booking,
    Agoda,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Google => "google",
            Self::Tripadvisor => "tripadvisor",
            Self::Makemytrip => "makemytrip",
            Self::Booking => "booking.com",
            Self::Agoda => "agoda",
        }
    }
}

/// Topic a review talks about. A review carries one or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Ambiance,
    Amenities,
    #[serde(alias = "services")]
    Service,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::Food, Self::Ambiance, Self::Amenities, Self::Service];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Ambiance => "ambiance",
            Self::Amenities => "amenities",
            Self::Service => "service",
        }
    }
}

/// Error returned when a string is not part of a closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub value: String,
    pub expected: &'static [&'static str],
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is not one of: {}",
            self.value,
            self.expected.join(", ")
        )
    }
}

impl std::error::Error for UnknownVariant {}

fn parse_variant<T: Copy>(
    raw: &str,
    table: &[(&'static str, T)],
    expected: &'static [&'static str],
) -> Result<T, UnknownVariant> {
    let needle = raw.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, v)| *v)
        .ok_or_else(|| UnknownVariant {
            value: raw.to_string(),
            expected,
        })
}

impl FromStr for Sentiment {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            s,
            &[
                ("positive", Self::Positive),
                ("neutral", Self::Neutral),
                ("negative", Self::Negative),
            ],
            &["positive", "neutral", "negative"],
        )
    }
}

impl FromStr for Urgency {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            s,
            &[
                ("none", Self::None),
                ("high", Self::High),
                ("critical", Self::Critical),
            ],
            &["none", "high", "critical"],
        )
    }
}

impl FromStr for Source {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            s,
            &[
                ("internal", Self::Internal),
                ("google", Self::Google),
                ("tripadvisor", Self::Tripadvisor),
                ("makemytrip", Self::Makemytrip),
                ("booking.com", Self::Booking),
                ("booking", Self::Booking),
                ("agoda", Self::Agoda),
            ],
            &[
                "internal",
                "google",
                "tripadvisor",
                "makemytrip",
                "booking.com",
                "agoda",
            ],
        )
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_variant(
            s,
            &[
                ("food", Self::Food),
                ("ambiance", Self::Ambiance),
                ("amenities", Self::Amenities),
                ("service", Self::Service),
                ("services", Self::Service),
            ],
            &["food", "ambiance", "amenities", "service"],
        )
    }
}

macro_rules! display_via_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_via_as_str!(Sentiment, Urgency, Source, Category);

/// A hotel or resort that reviews attach to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Aggregate rating, 1.0..=5.0. Starts as the imported base rating and is
    /// recomputed from non-spam reviews whenever the review set changes.
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

/// A guest review with every field derived at intake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub property_id: String,
    #[serde(default)]
    pub property_name: String,
    /// Authoring account, if the review was submitted by a signed-in user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_phone: Option<String>,
    pub rating: u8,
    pub text: String,
    pub source: Source,
    pub categories: Vec<Category>,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub festival_tag: Option<String>,
    #[serde(default)]
    pub requires_action: bool,
    #[serde(default)]
    pub is_spam: bool,
    #[serde(default)]
    pub spam_reasons: Vec<String>,
    #[serde(default)]
    pub alert_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn has_category(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}
