#![forbid(unsafe_code)]

use std::time::Duration;

use serde_json::Value;

/// Typed failure from an outbound collaborator call. `error_kind` is a small
/// stable vocabulary so callers can branch without string matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCallError {
    pub provider: &'static str,
    pub error_kind: &'static str,
    pub http_status: Option<u16>,
}

impl ProviderCallError {
    pub fn new(provider: &'static str, error_kind: &'static str, http_status: Option<u16>) -> Self {
        Self {
            provider,
            error_kind,
            http_status,
        }
    }
}

impl std::fmt::Display for ProviderCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.http_status {
            Some(status) => write!(
                f,
                "{} call failed: {} (http {status})",
                self.provider, self.error_kind
            ),
            None => write!(f, "{} call failed: {}", self.provider, self.error_kind),
        }
    }
}

pub fn build_http_agent(timeout_ms: u32, user_agent: &str) -> Result<ureq::Agent, String> {
    if timeout_ms == 0 {
        return Err("timeout must be > 0".to_string());
    }
    let timeout = Duration::from_millis(u64::from(timeout_ms).max(100));
    Ok(ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .timeout_write(timeout)
        .user_agent(user_agent)
        .build())
}

pub fn post_json(
    agent: &ureq::Agent,
    provider: &'static str,
    endpoint: &str,
    api_key: &str,
    payload: &Value,
) -> Result<Value, ProviderCallError> {
    let response = agent
        .post(endpoint)
        .set("Content-Type", "application/json")
        .set("Authorization", &format!("Bearer {api_key}"))
        .set("Accept", "application/json")
        .send_json(payload.clone())
        .map_err(|e| provider_error_from_ureq(provider, e))?;
    serde_json::from_reader(response.into_reader())
        .map_err(|_| ProviderCallError::new(provider, "json_parse", None))
}

pub fn provider_error_from_ureq(provider: &'static str, err: ureq::Error) -> ProviderCallError {
    match err {
        ureq::Error::Status(status, _) => {
            ProviderCallError::new(provider, "http_non_200", Some(status as u16))
        }
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            ProviderCallError::new(provider, classify_transport_error_kind(&combined), None)
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") || lower.contains("resolve") {
        "dns"
    } else {
        "connection"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_provider_01_zero_timeout_refused() {
        assert!(build_http_agent(0, "voicenudge/0.1").is_err());
        assert!(build_http_agent(5_000, "voicenudge/0.1").is_ok());
    }

    #[test]
    fn at_provider_02_transport_kinds_classified() {
        assert_eq!(classify_transport_error_kind("Io connection timeout"), "timeout");
        assert_eq!(classify_transport_error_kind("Dns failed to resolve"), "dns");
        assert_eq!(classify_transport_error_kind("tls handshake"), "tls");
        assert_eq!(classify_transport_error_kind("something else"), "connection");
    }
}
