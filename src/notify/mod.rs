//! Outbound guest-recovery messaging.
//!
//! One [`Notifier`] capability with a variant per provider. The active
//! variant is picked from config by [`build_notifier`]; business logic never
//! branches on the provider.

pub mod demo;
pub mod message;
pub mod twilio;
pub mod whatsapp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{NotifierKind, NotifyConfig};

pub use crate::notify::demo::DemoNotifier;
pub use crate::notify::message::MessageTemplate;
pub use crate::notify::twilio::TwilioNotifier;
pub use crate::notify::whatsapp::WhatsAppCloudNotifier;

/// What the guest is told about, and where to reach them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestAlert {
    pub phone: String,
    pub name: Option<String>,
    pub property_name: String,
    pub rating: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    /// Demo mode: written to the log instead of a provider.
    Logged,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Logged => "logged",
        }
    }
}

/// Outcome for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub channel: String,
    pub status: DeliveryStatus,
    /// Provider message id on success, error text on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Delivery {
    pub fn sent(channel: &str, id: Option<String>) -> Self {
        Self {
            channel: channel.to_string(),
            status: DeliveryStatus::Sent,
            detail: id,
        }
    }

    pub fn failed(channel: &str, detail: impl Into<String>) -> Self {
        Self {
            channel: channel.to_string(),
            status: DeliveryStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn logged(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            status: DeliveryStatus::Logged,
            detail: None,
        }
    }
}

/// An alert counts as dispatched when at least one channel sent or logged it.
pub fn any_dispatched(deliveries: &[Delivery]) -> bool {
    deliveries
        .iter()
        .any(|d| matches!(d.status, DeliveryStatus::Sent | DeliveryStatus::Logged))
}

/// Deliver a guest-recovery message. Implementations report failures as
/// `Failed` entries and never return an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send_guest_alert(&self, alert: &GuestAlert) -> Vec<Delivery>;
}

/// Pick the notifier named in config. A provider without credentials falls
/// back to the demo notifier.
pub fn build_notifier(cfg: &NotifyConfig) -> Arc<dyn Notifier> {
    let template = MessageTemplate::from_config(cfg);

    let chosen: Option<Arc<dyn Notifier>> = match cfg.provider {
        NotifierKind::Demo => None,
        NotifierKind::Twilio => TwilioNotifier::from_config(cfg, template.clone())
            .map(|n| Arc::new(n) as Arc<dyn Notifier>),
        NotifierKind::Whatsapp => WhatsAppCloudNotifier::from_config(cfg, template.clone())
            .map(|n| Arc::new(n) as Arc<dyn Notifier>),
    };

    match chosen {
        Some(n) => {
            info!(target: "notify", provider = n.name(), "guest notifier ready");
            n
        }
        None => {
            if cfg.provider != NotifierKind::Demo {
                warn!(
                    target: "notify",
                    provider = ?cfg.provider,
                    "provider credentials missing, falling back to demo notifier"
                );
            }
            Arc::new(DemoNotifier::new(template))
        }
    }
}
