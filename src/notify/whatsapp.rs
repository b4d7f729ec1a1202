//! Meta WhatsApp Business Cloud API.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use super::message::{normalize_digits, MessageStyle, MessageTemplate};
use super::{Delivery, GuestAlert, Notifier};
use crate::config::NotifyConfig;
use crate::logging::anon_id;

const CHANNEL: &str = "whatsapp";

#[derive(Clone)]
pub struct WhatsAppCloudNotifier {
    client: Client,
    token: String,
    phone_number_id: String,
    api_base: String,
    api_version: String,
    country_code: String,
    timeout: Duration,
    template: MessageTemplate,
}

#[derive(Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct SendText<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphResponse {
    #[serde(default)]
    messages: Vec<GraphMessage>,
    #[serde(default)]
    error: Option<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
}

impl WhatsAppCloudNotifier {
    /// `None` unless both the access token and phone number id are set.
    pub fn from_config(cfg: &NotifyConfig, template: MessageTemplate) -> Option<Self> {
        let w = &cfg.whatsapp;
        Some(Self {
            client: Client::new(),
            token: w.token.clone().filter(|s| !s.is_empty())?,
            phone_number_id: w.phone_number_id.clone().filter(|s| !s.is_empty())?,
            api_base: w.api_base.trim_end_matches('/').to_string(),
            api_version: w.api_version.clone(),
            country_code: cfg.default_country_code.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            template,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base, self.api_version, self.phone_number_id
        )
    }

    async fn post_text(&self, to: &str, body: &str) -> Result<String> {
        let payload = SendText {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body },
        };
        let rsp = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .context("WhatsApp request failed")?;

        let data: GraphResponse = rsp.json().await.unwrap_or_default();
        if let Some(m) = data.messages.into_iter().next() {
            return Ok(m.id);
        }

        let (message, code) = match data.error {
            Some(e) => (e.message.unwrap_or_else(|| "unknown error".into()), e.code),
            None => ("empty response".to_string(), None),
        };
        if let Some(hint) = code.and_then(error_hint) {
            warn!(target: "notify", code = ?code, hint, "WhatsApp API rejected message");
        }
        Err(anyhow!(
            "WhatsApp API error: {message}{}",
            code.map(|c| format!(" (code {c})")).unwrap_or_default()
        ))
    }
}

/// Operator hints for the Graph API errors seen most often.
fn error_hint(code: i64) -> Option<&'static str> {
    match code {
        131047 => Some("recipient has not opted in; send a template or wait for them to message first"),
        100 => Some("invalid phone number format or phone number id"),
        190 => Some("access token invalid or expired"),
        _ => None,
    }
}

#[async_trait]
impl Notifier for WhatsAppCloudNotifier {
    fn name(&self) -> &'static str {
        "whatsapp_cloud"
    }

    async fn send_guest_alert(&self, alert: &GuestAlert) -> Vec<Delivery> {
        let Some(to) = normalize_digits(&alert.phone, &self.country_code) else {
            return vec![Delivery::failed(CHANNEL, "invalid phone number")];
        };
        let body = self.template.compose(
            alert.name.as_deref(),
            &alert.property_name,
            alert.rating,
            MessageStyle::WhatsApp,
        );

        match self.post_text(&to, &body).await {
            Ok(wamid) => {
                info!(target: "notify", to = %anon_id(&to), wamid = %wamid, "WhatsApp alert sent");
                vec![Delivery::sent(CHANNEL, Some(wamid))]
            }
            Err(e) => {
                warn!(target: "notify", to = %anon_id(&to), error = %e, "WhatsApp alert failed");
                vec![Delivery::failed(CHANNEL, e.to_string())]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::DeliveryStatus;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg() -> NotifyConfig {
        let mut cfg = NotifyConfig::default();
        cfg.whatsapp.token = Some("tok".into());
        cfg.whatsapp.phone_number_id = Some("1055".into());
        cfg.whatsapp.api_base = "http://127.0.0.1:9/".into();
        cfg.timeout_secs = 2;
        cfg
    }

    #[test]
    fn url_includes_version_and_phone_id() {
        let c = cfg();
        let n = WhatsAppCloudNotifier::from_config(&c, MessageTemplate::from_config(&c)).unwrap();
        assert_eq!(n.messages_url(), "http://127.0.0.1:9/v19.0/1055/messages");
    }

    #[test]
    fn payload_shape() {
        let v = serde_json::to_value(SendText {
            messaging_product: "whatsapp",
            to: "919876543210",
            kind: "text",
            text: TextBody { body: "hi" },
        })
        .unwrap();
        assert_eq!(v["type"], "text");
        assert_eq!(v["text"]["body"], "hi");
        assert_eq!(v["to"], "919876543210");
    }

    #[test]
    fn graph_error_parses() {
        let r: GraphResponse =
            serde_json::from_str(r#"{"error":{"message":"bad token","code":190}}"#).unwrap();
        let e = r.error.unwrap();
        assert_eq!(e.code, Some(190));
        assert!(error_hint(190).is_some());
        assert!(error_hint(1).is_none());
    }

    #[tokio::test]
    async fn unreachable_api_yields_failed_entry() {
        let c = cfg();
        let n = WhatsAppCloudNotifier::from_config(&c, MessageTemplate::from_config(&c)).unwrap();
        let out = n
            .send_guest_alert(&GuestAlert {
                phone: "+91 98765 43210".into(),
                name: None,
                property_name: "W Juhu".into(),
                rating: 1,
            })
            .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].channel, "whatsapp");
        assert_eq!(out[0].status, DeliveryStatus::Failed);
    }

    fn alert() -> GuestAlert {
        GuestAlert {
            phone: "+91 98765 43210".into(),
            name: Some("Ravi".into()),
            property_name: "W Juhu".into(),
            rating: 1,
        }
    }

    #[tokio::test]
    async fn message_id_becomes_sent_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v19.0/1055/messages"))
            .and(bearer_token("tok"))
            .and(body_partial_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "919876543210",
                "type": "text"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "contacts": [{ "input": "919876543210", "wa_id": "919876543210" }],
                "messages": [{ "id": "wamid.HBgM" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut c = cfg();
        c.whatsapp.api_base = server.uri();
        let n = WhatsAppCloudNotifier::from_config(&c, MessageTemplate::from_config(&c)).unwrap();

        let out = n.send_guest_alert(&alert()).await;
        assert_eq!(out, vec![Delivery::sent("whatsapp", Some("wamid.HBgM".into()))]);

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        let text = body["text"]["body"].as_str().unwrap();
        assert!(text.starts_with("Dear Ravi,"));
        assert!(text.contains("*W Juhu*"));
    }

    #[tokio::test]
    async fn graph_error_becomes_failed_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Error validating access token", "code": 190 }
            })))
            .mount(&server)
            .await;

        let mut c = cfg();
        c.whatsapp.api_base = server.uri();
        let n = WhatsAppCloudNotifier::from_config(&c, MessageTemplate::from_config(&c)).unwrap();

        let out = n.send_guest_alert(&alert()).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, DeliveryStatus::Failed);
        assert_eq!(
            out[0].detail.as_deref(),
            Some("WhatsApp API error: Error validating access token (code 190)")
        );
    }
}
