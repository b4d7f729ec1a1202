//! Guest-facing message text and phone number normalisation.

use crate::config::NotifyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStyle {
    Plain,
    /// WhatsApp markup: `*bold*` around the property and contact details.
    WhatsApp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub support_phone: String,
    pub support_email: String,
    pub signature: String,
}

impl MessageTemplate {
    pub fn from_config(cfg: &NotifyConfig) -> Self {
        Self {
            support_phone: cfg.support_phone.clone(),
            support_email: cfg.support_email.clone(),
            signature: cfg.signature.clone(),
        }
    }

    pub fn compose(
        &self,
        name: Option<&str>,
        property_name: &str,
        rating: u8,
        style: MessageStyle,
    ) -> String {
        let b = |s: &str| match style {
            MessageStyle::Plain => s.to_string(),
            MessageStyle::WhatsApp => format!("*{s}*"),
        };
        let guest = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("Valued Guest");

        [
            format!("Dear {guest},"),
            String::new(),
            format!(
                "Thank you for your feedback about {} ({}).",
                b(property_name),
                stars(rating)
            ),
            String::new(),
            format!(
                "We sincerely apologize your experience did not meet our standards. \
                 Our management team is personally reviewing your case and will reach out within {}.",
                b("24 hours")
            ),
            String::new(),
            "Immediate support:".to_string(),
            format!("Phone: {}", b(&self.support_phone)),
            format!("Email: {}", self.support_email),
            String::new(),
            "Thank you for helping us improve.".to_string(),
            String::new(),
            format!("- {}", b(&self.signature)),
        ]
        .join("\n")
    }
}

/// `★` per star and `☆` for the remainder, out of five.
pub fn stars(rating: u8) -> String {
    let filled = usize::from(rating.min(5));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

/// Digits-only form without `+`. Bare national numbers (10 digits) get the
/// default country code. `None` when nothing dialable is left.
pub fn normalize_digits(phone: &str, country_code: &str) -> Option<String> {
    match split_phone(phone)? {
        Dial::International(d) => Some(d),
        Dial::Bare(d) if d.len() == 10 => Some(format!("{country_code}{d}")),
        Dial::Bare(d) => Some(d),
    }
}

/// E.164 form. Every bare number gets the default country code unless it
/// already carries it in front of a 10-digit national number.
pub fn to_e164(phone: &str, country_code: &str) -> Option<String> {
    match split_phone(phone)? {
        Dial::International(d) => Some(format!("+{d}")),
        Dial::Bare(d) if d.len() == country_code.len() + 10 && d.starts_with(country_code) => {
            Some(format!("+{d}"))
        }
        Dial::Bare(d) => Some(format!("+{country_code}{d}")),
    }
}

enum Dial {
    International(String),
    Bare(String),
}

fn split_phone(phone: &str) -> Option<Dial> {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    if let Some(rest) = cleaned.strip_prefix('+') {
        return is_digits(rest).then(|| Dial::International(rest.to_string()));
    }
    is_digits(&cleaned).then_some(Dial::Bare(cleaned))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> MessageTemplate {
        MessageTemplate::from_config(&NotifyConfig::default())
    }

    #[test]
    fn star_strings() {
        assert_eq!(stars(1), "★☆☆☆☆");
        assert_eq!(stars(5), "★★★★★");
        assert_eq!(stars(9), "★★★★★");
    }

    #[test]
    fn message_carries_required_fields() {
        let m = template().compose(Some("Ravi"), "W Juhu", 2, MessageStyle::Plain);
        assert!(m.starts_with("Dear Ravi,"));
        assert!(m.contains("W Juhu (★★☆☆☆)"));
        assert!(m.contains("1800-123-4567"));
        assert!(m.contains("guestrelations@example.com"));
    }

    #[test]
    fn missing_name_uses_generic_greeting() {
        let m = template().compose(Some("  "), "W Juhu", 1, MessageStyle::WhatsApp);
        assert!(m.starts_with("Dear Valued Guest,"));
        assert!(m.contains("*W Juhu*"));
        assert!(m.contains("*24 hours*"));
    }

    #[test]
    fn phone_normalisation() {
        assert_eq!(normalize_digits("98765 43210", "91").as_deref(), Some("919876543210"));
        assert_eq!(normalize_digits("+44 (20) 7946-0958", "91").as_deref(), Some("442079460958"));
        assert_eq!(normalize_digits("919876543210", "91").as_deref(), Some("919876543210"));
        assert_eq!(normalize_digits("call me", "91"), None);
        assert_eq!(normalize_digits("+", "91"), None);
        assert_eq!(to_e164("9876543210", "91").as_deref(), Some("+919876543210"));
    }

    #[test]
    fn sms_numbers_without_plus_get_country_code() {
        assert_eq!(to_e164("5551234", "91").as_deref(), Some("+915551234"));
        assert_eq!(to_e164("919876543210", "91").as_deref(), Some("+919876543210"));
        assert_eq!(to_e164("+1 555 123 4567", "91").as_deref(), Some("+15551234567"));
        assert_eq!(to_e164("n/a", "91"), None);
        // WhatsApp keeps short bare numbers as dialled
        assert_eq!(normalize_digits("5551234", "91").as_deref(), Some("5551234"));
    }
}
