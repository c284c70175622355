//! Pre-dispatch validation.
//!
//! Everything rejected here is terminal: the message never reaches a
//! provider and is never truncated or rewritten beyond recipient
//! normalization.

use thiserror::Error;
use validator::ValidateEmail;

use super::adapter::OutboundMessage;
use crate::config::DeliveryConfig;
use crate::models::Channel;

const MIN_PHONE_DIGITS: usize = 8;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid phone number '{input}': {reason}")]
    InvalidPhone { input: String, reason: String },

    #[error("Invalid email address '{0}'")]
    InvalidEmail(String),

    #[error("Message content is empty")]
    EmptyContent,

    #[error("{channel} content is {length} characters, limit is {limit}")]
    ContentTooLong {
        channel: Channel,
        length: usize,
        limit: usize,
    },

    #[error("Email subject is {length} characters, limit is {limit}")]
    SubjectTooLong { length: usize, limit: usize },

    #[error("Message contains prohibited term '{term}'")]
    ProhibitedContent { term: String },
}

fn invalid_phone(input: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidPhone {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Normalize a phone number to E.164 (`+` followed by 8-15 digits).
///
/// Accepts `+` or `00` international prefixes and common formatting
/// characters. National numbers need `default_country_code`; a leading trunk
/// `0` is dropped before it is applied.
pub fn normalize_phone(input: &str, default_country_code: Option<&str>) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid_phone(input, "empty"));
    }

    let (international, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
        (true, rest)
    } else if let Some(rest) = trimmed.strip_prefix("00") {
        (true, rest)
    } else {
        (false, trimmed)
    };

    let mut digits = String::with_capacity(rest.len());
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(invalid_phone(input, "unexpected character")),
        }
    }

    if !international {
        let Some(code) = default_country_code else {
            return Err(invalid_phone(input, "missing country code"));
        };
        let national = digits.trim_start_matches('0');
        digits = format!("{code}{national}");
    }

    if digits.starts_with('0') {
        return Err(invalid_phone(input, "country code cannot start with 0"));
    }
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits.len()) {
        return Err(invalid_phone(input, "expected 8 to 15 digits"));
    }
    Ok(format!("+{digits}"))
}

/// Syntactic email check; deliverability is the provider's concern.
///
/// Single-label hosts such as `localhost` are rejected since customers are
/// reached over public mail routes.
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    let address = input.trim();
    let routable = address
        .rsplit_once('@')
        .is_some_and(|(_, host)| host.contains('.'));

    if ValidateEmail::validate_email(&address) && routable {
        Ok(address.to_string())
    } else {
        Err(ValidationError::InvalidEmail(input.to_string()))
    }
}

/// Content and recipient rules applied before any provider call
#[derive(Debug, Clone)]
pub struct ContentPolicy {
    default_country_code: Option<String>,
    email_max_content_length: usize,
    email_subject_max_length: usize,
    whatsapp_max_content_length: usize,
    sms_max_content_length: usize,
    prohibited_terms: Vec<String>,
}

impl ContentPolicy {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            default_country_code: config.default_country_code.clone(),
            email_max_content_length: config.email_max_content_length,
            email_subject_max_length: config.email_subject_max_length,
            whatsapp_max_content_length: config.whatsapp_max_content_length,
            sms_max_content_length: config.sms_max_content_length,
            prohibited_terms: config
                .prohibited_terms
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn max_content_length(&self, channel: Channel) -> usize {
        match channel {
            Channel::Email => self.email_max_content_length,
            Channel::WhatsApp => self.whatsapp_max_content_length,
            Channel::Sms => self.sms_max_content_length,
        }
    }

    /// Validate `message`, returning it with a normalized recipient
    pub fn validate(&self, message: &OutboundMessage) -> Result<OutboundMessage, ValidationError> {
        let recipient = match message.channel {
            Channel::Email => validate_email(&message.recipient)?,
            Channel::WhatsApp | Channel::Sms => {
                normalize_phone(&message.recipient, self.default_country_code.as_deref())?
            }
        };

        if message.content.trim().is_empty() && message.template_ref.is_none() {
            return Err(ValidationError::EmptyContent);
        }

        let length = message.content.chars().count();
        let limit = self.max_content_length(message.channel);
        if length > limit {
            return Err(ValidationError::ContentTooLong {
                channel: message.channel,
                length,
                limit,
            });
        }

        if let (Channel::Email, Some(subject)) = (message.channel, &message.subject) {
            let length = subject.chars().count();
            if length > self.email_subject_max_length {
                return Err(ValidationError::SubjectTooLong {
                    length,
                    limit: self.email_subject_max_length,
                });
            }
        }

        self.check_prohibited(&message.content)?;
        if let Some(subject) = &message.subject {
            self.check_prohibited(subject)?;
        }

        Ok(OutboundMessage {
            recipient,
            ..message.clone()
        })
    }

    fn check_prohibited(&self, text: &str) -> Result<(), ValidationError> {
        let lowered = text.to_lowercase();
        match self.prohibited_terms.iter().find(|t| lowered.contains(t.as_str())) {
            Some(term) => Err(ValidationError::ProhibitedContent { term: term.clone() }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ContentPolicy {
        ContentPolicy::from_config(&DeliveryConfig {
            default_country_code: Some("91".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("+971 50-123 4567", None).unwrap(), "+971501234567");
        assert_eq!(normalize_phone("0044 (20) 7946 0958", None).unwrap(), "+442079460958");
        assert_eq!(normalize_phone("098765 43210", Some("91")).unwrap(), "+919876543210");
    }

    #[test]
    fn test_malformed_phones_are_rejected() {
        assert!(normalize_phone("", Some("91")).is_err());
        assert!(normalize_phone("+1 555 CALL NOW", None).is_err());
        assert!(normalize_phone("12345", Some("91")).is_err());
        assert!(normalize_phone("9876543210", None).is_err());
        assert!(normalize_phone("+0123456789", None).is_err());
        assert!(normalize_phone("+1234567890123456", None).is_err());
    }

    #[test]
    fn test_email_checks() {
        assert_eq!(validate_email(" buyer@example.co.uk ").unwrap(), "buyer@example.co.uk");
        assert!(validate_email("buyer@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
        assert!(validate_email("buyer @example.com").is_err());
        assert!(validate_email("buyer@-exports.example.com").is_err());
        assert!(validate_email("buyer@example..com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_content_limit_is_not_truncated() {
        let p = policy();
        let body = "x".repeat(p.max_content_length(Channel::Sms) + 1);
        let message = OutboundMessage::new(Channel::Sms, "+919876543210", body);
        assert!(matches!(
            p.validate(&message),
            Err(ValidationError::ContentTooLong { channel: Channel::Sms, .. })
        ));
    }

    #[test]
    fn test_prohibited_terms_ignore_case() {
        let message = OutboundMessage::new(
            Channel::Email,
            "buyer@example.com",
            "You are a LOTTERY Winner!",
        );
        assert_eq!(
            policy().validate(&message),
            Err(ValidationError::ProhibitedContent {
                term: "lottery winner".to_string()
            })
        );
    }

    #[test]
    fn test_validate_returns_normalized_recipient() {
        let message = OutboundMessage::new(Channel::WhatsApp, "98765 43210", "Your order shipped");
        let validated = policy().validate(&message).unwrap();
        assert_eq!(validated.recipient, "+919876543210");
        assert_eq!(validated.content, message.content);
    }
}
