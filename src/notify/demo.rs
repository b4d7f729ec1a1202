use async_trait::async_trait;
use tracing::info;

use super::message::{stars, MessageStyle, MessageTemplate};
use super::{Delivery, GuestAlert, Notifier};
use crate::logging::anon_id;

/// Logs the alert instead of sending it.
#[derive(Debug, Clone)]
pub struct DemoNotifier {
    template: MessageTemplate,
}

impl DemoNotifier {
    pub fn new(template: MessageTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl Notifier for DemoNotifier {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn send_guest_alert(&self, alert: &GuestAlert) -> Vec<Delivery> {
        let body = self.template.compose(
            alert.name.as_deref(),
            &alert.property_name,
            alert.rating,
            MessageStyle::Plain,
        );
        info!(
            target: "notify",
            to = %anon_id(&alert.phone),
            property = %alert.property_name,
            rating = %stars(alert.rating),
            chars = body.chars().count(),
            "demo guest alert (no provider configured)"
        );
        vec![Delivery::logged("demo")]
    }
}
