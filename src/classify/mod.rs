// src/classify/mod.rs
//! Review classification: spam rules plus sentiment/urgency derivation.

pub mod sentiment;
pub mod spam;

pub use crate::classify::sentiment::{
    classify, is_alert_worthy, requires_action, sentiment_for_rating, should_alert, Classification,
};
pub use crate::classify::spam::{SpamClassifier, SpamParams, SpamSignal, SpamVerdict};
