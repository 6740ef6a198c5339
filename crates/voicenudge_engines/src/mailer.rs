#![forbid(unsafe_code)]

use voicenudge_kernel_contracts::auth::EmailAddress;
use voicenudge_kernel_contracts::{ContractViolation, Validate};

use crate::provider::{build_http_agent, post_json, ProviderCallError};

pub type SendError = ProviderCallError;

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: EmailAddress,
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
}

impl EmailMessage {
    pub fn v1(
        to: EmailAddress,
        subject: String,
        body: String,
        html_body: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let m = Self {
            to,
            subject,
            body,
            html_body,
        };
        m.validate()?;
        Ok(m)
    }
}

impl Validate for EmailMessage {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.to.validate()?;
        if self.subject.trim().is_empty() || self.subject.len() > 256 {
            return Err(ContractViolation::InvalidValue {
                field: "email_message.subject",
                reason: "must be 1..=256 chars",
            });
        }
        if self.body.trim().is_empty() || self.body.len() > 16_384 {
            return Err(ContractViolation::InvalidValue {
                field: "email_message.body",
                reason: "must be 1..=16384 chars",
            });
        }
        if let Some(html) = &self.html_body {
            if html.trim().is_empty() || html.len() > 65_536 {
                return Err(ContractViolation::InvalidValue {
                    field: "email_message.html_body",
                    reason: "must be 1..=65536 chars when present",
                });
            }
        }
        Ok(())
    }
}

/// Opaque outbound-notification capability. A failed send is a typed error;
/// callers decide whether to surface or retry.
pub trait NotificationSender {
    fn send(&self, message: &EmailMessage) -> Result<(), SendError>;
}

/// Posts messages to an HTTP mail-relay endpoint (SMTP is the relay's
/// problem, not ours).
#[derive(Debug, Clone)]
pub struct HttpMailRelay {
    endpoint: String,
    api_key: String,
    sender_address: EmailAddress,
    timeout_ms: u32,
    user_agent: String,
}

impl HttpMailRelay {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        sender_address: EmailAddress,
        timeout_ms: u32,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            sender_address,
            timeout_ms,
            user_agent: user_agent.into(),
        }
    }
}

impl NotificationSender for HttpMailRelay {
    fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        let agent = build_http_agent(self.timeout_ms, &self.user_agent)
            .map_err(|_| SendError::new("mail_relay", "config_invalid", None))?;
        let payload = serde_json::json!({
            "from": self.sender_address.as_str(),
            "to": message.to.as_str(),
            "subject": message.subject,
            "body": message.body,
            "html_body": message.html_body,
        });
        post_json(&agent, "mail_relay", &self.endpoint, &self.api_key, &payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to() -> EmailAddress {
        EmailAddress::new("user@example.com").unwrap()
    }

    #[test]
    fn at_mail_01_blank_subject_or_body_refused() {
        assert!(EmailMessage::v1(to(), "  ".to_string(), "body".to_string(), None).is_err());
        assert!(EmailMessage::v1(to(), "subject".to_string(), "".to_string(), None).is_err());
        assert!(EmailMessage::v1(to(), "subject".to_string(), "body".to_string(), None).is_ok());
    }
}
