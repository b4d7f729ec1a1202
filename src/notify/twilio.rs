//! Twilio Programmable Messaging (SMS and WhatsApp).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::message::{to_e164, MessageStyle, MessageTemplate};
use super::{Delivery, GuestAlert, Notifier};
use crate::config::NotifyConfig;
use crate::logging::anon_id;

#[derive(Clone)]
pub struct TwilioNotifier {
    client: Client,
    account_sid: String,
    auth_token: String,
    sms_from: Option<String>,
    whatsapp_from: Option<String>,
    api_base: String,
    country_code: String,
    timeout: Duration,
    template: MessageTemplate,
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    sid: String,
}

#[derive(Debug, Default, Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioNotifier {
    /// `None` unless the account credentials and at least one sender are set.
    pub fn from_config(cfg: &NotifyConfig, template: MessageTemplate) -> Option<Self> {
        let t = &cfg.twilio;
        let account_sid = t.account_sid.clone().filter(|s| !s.is_empty())?;
        let auth_token = t.auth_token.clone().filter(|s| !s.is_empty())?;
        if t.sms_from.is_none() && t.whatsapp_from.is_none() {
            return None;
        }
        Some(Self {
            client: Client::new(),
            account_sid,
            auth_token,
            sms_from: t.sms_from.clone(),
            whatsapp_from: t.whatsapp_from.clone(),
            api_base: t.api_base.trim_end_matches('/').to_string(),
            country_code: cfg.default_country_code.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            template,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }

    async fn create_message(&self, from: &str, to: &str, body: &str) -> Result<String> {
        let form = [("From", from), ("To", to), ("Body", body)];
        let rsp = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .context("Twilio request failed")?;

        let status = rsp.status();
        if !status.is_success() {
            let err: TwilioErrorBody = rsp.json().await.unwrap_or_default();
            return Err(anyhow!(
                "Twilio HTTP {}: {} (code {})",
                status.as_u16(),
                err.message.unwrap_or_else(|| "no message".into()),
                err.code.map_or_else(|| "-".to_string(), |c| c.to_string())
            ));
        }

        let created: MessageCreated = rsp.json().await.context("parsing Twilio response")?;
        Ok(created.sid)
    }

    async fn deliver(&self, channel: &str, from: &str, to: &str, body: &str) -> Delivery {
        match self.create_message(from, to, body).await {
            Ok(sid) => {
                info!(target: "notify", channel, to = %anon_id(to), sid = %sid, "guest alert sent");
                Delivery::sent(channel, Some(sid))
            }
            Err(e) => {
                warn!(target: "notify", channel, to = %anon_id(to), error = %e, "guest alert failed");
                Delivery::failed(channel, e.to_string())
            }
        }
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn send_guest_alert(&self, alert: &GuestAlert) -> Vec<Delivery> {
        let Some(to) = to_e164(&alert.phone, &self.country_code) else {
            return vec![Delivery::failed("sms", "invalid phone number")];
        };
        let body = self.template.compose(
            alert.name.as_deref(),
            &alert.property_name,
            alert.rating,
            MessageStyle::Plain,
        );

        let mut out = Vec::with_capacity(2);
        if let Some(wa_from) = &self.whatsapp_from {
            out.push(
                self.deliver(
                    "whatsapp",
                    &format!("whatsapp:{wa_from}"),
                    &format!("whatsapp:{to}"),
                    &body,
                )
                .await,
            );
        }
        if let Some(from) = &self.sms_from {
            out.push(self.deliver("sms", from, &to, &body).await);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::DeliveryStatus;
    use wiremock::matchers::{basic_auth, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn configured() -> NotifyConfig {
        let mut cfg = NotifyConfig::default();
        cfg.twilio.account_sid = Some("AC123".into());
        cfg.twilio.auth_token = Some("secret".into());
        cfg.twilio.sms_from = Some("+15550001111".into());
        // unroutable port, so every request fails fast
        cfg.twilio.api_base = "http://127.0.0.1:9".into();
        cfg.timeout_secs = 2;
        cfg
    }

    #[test]
    fn url_uses_account_sid() {
        let cfg = configured();
        let n = TwilioNotifier::from_config(&cfg, MessageTemplate::from_config(&cfg)).unwrap();
        assert_eq!(
            n.messages_url(),
            "http://127.0.0.1:9/2010-04-01/Accounts/AC123/Messages.json"
        );
    }

    #[tokio::test]
    async fn transport_errors_become_failed_entries() {
        let mut cfg = configured();
        cfg.twilio.whatsapp_from = Some("+15550002222".into());
        let n = TwilioNotifier::from_config(&cfg, MessageTemplate::from_config(&cfg)).unwrap();
        let out = n
            .send_guest_alert(&GuestAlert {
                phone: "9876543210".into(),
                name: Some("Ravi".into()),
                property_name: "W Juhu".into(),
                rating: 1,
            })
            .await;
        let channels: Vec<_> = out.iter().map(|d| d.channel.as_str()).collect();
        assert_eq!(channels, ["whatsapp", "sms"]);
        assert!(out.iter().all(|d| d.status == DeliveryStatus::Failed));
    }

    #[tokio::test]
    async fn garbage_phone_is_rejected_without_a_request() {
        let cfg = configured();
        let n = TwilioNotifier::from_config(&cfg, MessageTemplate::from_config(&cfg)).unwrap();
        let out = n
            .send_guest_alert(&GuestAlert {
                phone: "n/a".into(),
                name: None,
                property_name: "W Juhu".into(),
                rating: 2,
            })
            .await;
        assert_eq!(out, vec![Delivery::failed("sms", "invalid phone number")]);
    }

    fn alert() -> GuestAlert {
        GuestAlert {
            phone: "98765 43210".into(),
            name: Some("Ravi".into()),
            property_name: "W Juhu".into(),
            rating: 2,
        }
    }

    #[tokio::test]
    async fn created_message_sid_becomes_sent_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(basic_auth("AC123", "secret"))
            .and(body_string_contains("From=%2B15550001111"))
            .and(body_string_contains("To=%2B919876543210"))
            .and(body_string_contains("Body=Dear+Ravi"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "sid": "SM0001", "status": "queued" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = configured();
        cfg.twilio.api_base = server.uri();
        let n = TwilioNotifier::from_config(&cfg, MessageTemplate::from_config(&cfg)).unwrap();

        let out = n.send_guest_alert(&alert()).await;
        assert_eq!(out, vec![Delivery::sent("sms", Some("SM0001".into()))]);
    }

    #[tokio::test]
    async fn whatsapp_sender_goes_first_with_prefixed_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("From=whatsapp%3A%2B15550002222"))
            .and(body_string_contains("To=whatsapp%3A%2B919876543210"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "SMwa" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("From=%2B15550001111"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "SMsms" })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = configured();
        cfg.twilio.api_base = server.uri();
        cfg.twilio.whatsapp_from = Some("+15550002222".into());
        let n = TwilioNotifier::from_config(&cfg, MessageTemplate::from_config(&cfg)).unwrap();

        let out = n.send_guest_alert(&alert()).await;
        assert_eq!(
            out,
            vec![
                Delivery::sent("whatsapp", Some("SMwa".into())),
                Delivery::sent("sms", Some("SMsms".into())),
            ]
        );
    }

    #[tokio::test]
    async fn error_body_is_reported_on_failed_entry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number.",
                "status": 400
            })))
            .mount(&server)
            .await;

        let mut cfg = configured();
        cfg.twilio.api_base = server.uri();
        let n = TwilioNotifier::from_config(&cfg, MessageTemplate::from_config(&cfg)).unwrap();

        let out = n.send_guest_alert(&alert()).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, DeliveryStatus::Failed);
        let detail = out[0].detail.as_deref().unwrap();
        assert!(detail.contains("Twilio HTTP 400"), "{detail}");
        assert!(detail.contains("not a valid phone number"), "{detail}");
        assert!(detail.contains("code 21211"), "{detail}");
    }
}
