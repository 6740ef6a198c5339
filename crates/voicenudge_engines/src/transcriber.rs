#![forbid(unsafe_code)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::extractor::AudioSample;
use crate::provider::{build_http_agent, post_json, ProviderCallError};

#[derive(Debug, Clone, PartialEq)]
pub enum TranscribeError {
    Provider(ProviderCallError),
    MalformedTranscript,
}

impl std::fmt::Display for TranscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provider(err) => write!(f, "{err}"),
            Self::MalformedTranscript => write!(f, "transcriber returned no usable text"),
        }
    }
}

/// Opaque speech-to-text collaborator. `translate_to_english` requests an
/// English rendering alongside native-language recognition.
pub trait Transcriber {
    fn transcribe(
        &self,
        sample: &AudioSample,
        translate_to_english: bool,
    ) -> Result<String, TranscribeError>;
}

#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    endpoint: String,
    api_key: String,
    timeout_ms: u32,
    user_agent: String,
}

impl HttpTranscriber {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u32,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout_ms,
            user_agent: user_agent.into(),
        }
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(
        &self,
        sample: &AudioSample,
        translate_to_english: bool,
    ) -> Result<String, TranscribeError> {
        let agent = build_http_agent(self.timeout_ms, &self.user_agent).map_err(|_| {
            TranscribeError::Provider(ProviderCallError::new(
                "transcriber",
                "config_invalid",
                None,
            ))
        })?;
        let payload = serde_json::json!({
            "audio_b64": BASE64.encode(&sample.bytes),
            "duration_ms": sample.duration_ms,
            "translate": translate_to_english,
        });
        let body = post_json(&agent, "transcriber", &self.endpoint, &self.api_key, &payload)
            .map_err(TranscribeError::Provider)?;
        let text = body
            .get("text")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(TranscribeError::MalformedTranscript)?;
        Ok(text.to_string())
    }
}
