// src/lib.rs
//! Review aggregation and guest-alerting service.
//!
//! The binary only wires [`api::app`] into the Shuttle runtime; everything
//! else lives here so integration tests can drive it directly.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod intake;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod query;
pub mod stats;
pub mod store;

pub use crate::api::{app, router, AppState};
pub use crate::error::{AppError, AppResult};
pub use crate::intake::{ReviewIntake, SubmitOutcome, SubmitReview};
pub use crate::notify::{Delivery, DeliveryStatus, GuestAlert, Notifier};
