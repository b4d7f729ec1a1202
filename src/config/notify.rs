// src/config/notify.rs
use serde::{Deserialize, Serialize};
use std::str::FromStr;

fn default_country_code() -> String {
    "91".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_support_phone() -> String {
    "1800-123-4567".to_string()
}
fn default_support_email() -> String {
    "guestrelations@example.com".to_string()
}
fn default_signature() -> String {
    "Guest Relations".to_string()
}
fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}
fn default_graph_api_base() -> String {
    "https://graph.facebook.com".to_string()
}
fn default_graph_api_version() -> String {
    "v19.0".to_string()
}

/// Which outbound messaging backend delivers guest-recovery alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Log only.
    #[default]
    Demo,
    /// Twilio Programmable Messaging (SMS and/or WhatsApp).
    Twilio,
    /// Meta WhatsApp Business Cloud API.
    #[serde(alias = "whatsapp_cloud")]
    Whatsapp,
}

impl FromStr for NotifierKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" | "log" => Ok(Self::Demo),
            "twilio" | "sms" => Ok(Self::Twilio),
            "whatsapp" | "whatsapp_cloud" => Ok(Self::Whatsapp),
            other => anyhow::bail!("Unsupported notifier in config: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// SMS sender number.
    #[serde(default)]
    pub sms_from: Option<String>,
    /// WhatsApp sender number (without the `whatsapp:` prefix).
    #[serde(default)]
    pub whatsapp_from: Option<String>,
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatsAppCloudConfig {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub phone_number_id: Option<String>,
    #[serde(default = "default_graph_api_base")]
    pub api_base: String,
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub provider: NotifierKind,
    /// Prefix for bare national numbers, without `+`.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_support_phone")]
    pub support_phone: String,
    #[serde(default = "default_support_email")]
    pub support_email: String,
    #[serde(default = "default_signature")]
    pub signature: String,
    #[serde(default)]
    pub twilio: TwilioConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppCloudConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            provider: NotifierKind::default(),
            default_country_code: default_country_code(),
            timeout_secs: default_timeout_secs(),
            support_phone: default_support_phone(),
            support_email: default_support_email(),
            signature: default_signature(),
            twilio: TwilioConfig::default(),
            whatsapp: WhatsAppCloudConfig::default(),
        }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            sms_from: None,
            whatsapp_from: None,
            api_base: default_twilio_api_base(),
        }
    }
}

impl Default for WhatsAppCloudConfig {
    fn default() -> Self {
        Self {
            token: None,
            phone_number_id: None,
            api_base: default_graph_api_base(),
            api_version: default_graph_api_version(),
        }
    }
}

impl NotifyConfig {
    /// Overlay credentials and provider selection from the environment.
    pub(crate) fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("REVIEW_NOTIFIER") {
            match raw.parse() {
                Ok(kind) => self.provider = kind,
                Err(e) => tracing::warn!(target: "notify", error = %e, "ignoring REVIEW_NOTIFIER"),
            }
        }
        if let Some(cc) = lookup("REVIEW_DEFAULT_COUNTRY_CODE") {
            self.default_country_code = cc.trim_start_matches('+').to_string();
        }

        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(v) = lookup(key) {
                *slot = Some(v);
            }
        };
        set(&mut self.twilio.account_sid, "TWILIO_SID");
        set(&mut self.twilio.auth_token, "TWILIO_AUTH");
        set(&mut self.twilio.sms_from, "TWILIO_FROM");
        set(&mut self.twilio.whatsapp_from, "TWILIO_WA_FROM");
        set(&mut self.whatsapp.token, "WA_TOKEN");
        set(&mut self.whatsapp.phone_number_id, "WA_PHONE_ID");
    }
}
