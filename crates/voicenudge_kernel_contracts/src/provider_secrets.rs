#![forbid(unsafe_code)]

/// Closed set of secrets the runtime is allowed to store. Anything else is
/// refused at the vault boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderSecretId {
    MailRelayApiKey,
    VoiceEmbeddingApiKey,
    TranscriberApiKey,
    AdminUnlockToken,
}

impl ProviderSecretId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MailRelayApiKey => "mail_relay_api_key",
            Self::VoiceEmbeddingApiKey => "voice_embedding_api_key",
            Self::TranscriberApiKey => "transcriber_api_key",
            Self::AdminUnlockToken => "admin_unlock_token",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[
            Self::MailRelayApiKey,
            Self::VoiceEmbeddingApiKey,
            Self::TranscriberApiKey,
            Self::AdminUnlockToken,
        ]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|id| id.as_str() == normalized)
    }

    pub fn allowed_key_names() -> Vec<&'static str> {
        Self::all().iter().map(|id| id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ProviderSecretId;

    #[test]
    fn at_secret_id_01_names_parse_back() {
        for id in ProviderSecretId::all() {
            assert_eq!(ProviderSecretId::parse(id.as_str()), Some(*id));
        }
        assert_eq!(ProviderSecretId::parse("  Mail_Relay_API_Key "), Some(ProviderSecretId::MailRelayApiKey));
        assert_eq!(ProviderSecretId::parse("random_key"), None);
    }
}
