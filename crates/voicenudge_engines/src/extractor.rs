#![forbid(unsafe_code)]

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use voicenudge_kernel_contracts::auth::VoiceEmbedding;
use voicenudge_kernel_contracts::{ContractViolation, Validate};

use crate::provider::{build_http_agent, post_json, ProviderCallError};

/// Samples shorter than this carry too little speaker identity to embed.
pub const MIN_SAMPLE_DURATION_MS: u32 = 15_000;
/// Upper bound keeps request payloads sane.
pub const MAX_SAMPLE_DURATION_MS: u32 = 10 * 60 * 1_000;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioSample {
    pub bytes: Vec<u8>,
    pub duration_ms: u32,
}

impl AudioSample {
    pub fn v1(bytes: Vec<u8>, duration_ms: u32) -> Result<Self, ContractViolation> {
        let s = Self { bytes, duration_ms };
        s.validate()?;
        Ok(s)
    }
}

impl Validate for AudioSample {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.bytes.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "audio_sample.bytes",
                reason: "must not be empty",
            });
        }
        if self.duration_ms == 0 || self.duration_ms > MAX_SAMPLE_DURATION_MS {
            return Err(ContractViolation::InvalidValue {
                field: "audio_sample.duration_ms",
                reason: "must be within 1..=600000",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    SampleTooShort { duration_ms: u32, min_ms: u32 },
    Provider(ProviderCallError),
    MalformedEmbedding,
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SampleTooShort {
                duration_ms,
                min_ms,
            } => write!(
                f,
                "voice sample too short: {duration_ms}ms, need at least {min_ms}ms"
            ),
            Self::Provider(err) => write!(f, "{err}"),
            Self::MalformedEmbedding => write!(f, "extractor returned a malformed embedding"),
        }
    }
}

/// Opaque audio-bytes-to-vector collaborator. Implementations must enforce
/// the minimum sample duration before extracting.
pub trait EmbeddingExtractor {
    fn extract(&self, sample: &AudioSample) -> Result<VoiceEmbedding, ExtractionError>;
}

pub fn ensure_min_duration(sample: &AudioSample) -> Result<(), ExtractionError> {
    if sample.duration_ms < MIN_SAMPLE_DURATION_MS {
        return Err(ExtractionError::SampleTooShort {
            duration_ms: sample.duration_ms,
            min_ms: MIN_SAMPLE_DURATION_MS,
        });
    }
    Ok(())
}

/// Calls a speaker-embedding HTTP service. The service may answer with a
/// flat `embedding` array or a nested batch of rows; both are accepted.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingExtractor {
    endpoint: String,
    api_key: String,
    timeout_ms: u32,
    user_agent: String,
}

impl HttpEmbeddingExtractor {
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

impl EmbeddingExtractor for HttpEmbeddingExtractor {
    fn extract(&self, sample: &AudioSample) -> Result<VoiceEmbedding, ExtractionError> {
        ensure_min_duration(sample)?;
        let agent = build_http_agent(self.timeout_ms, &self.user_agent)
            .map_err(|_| {
                ExtractionError::Provider(ProviderCallError::new(
                    "voice_embedding",
                    "config_invalid",
                    None,
                ))
            })?;
        let payload = serde_json::json!({
            "audio_b64": BASE64.encode(&sample.bytes),
            "duration_ms": sample.duration_ms,
        });
        let body = post_json(&agent, "voice_embedding", &self.endpoint, &self.api_key, &payload)
            .map_err(ExtractionError::Provider)?;
        parse_embedding_response(&body).ok_or(ExtractionError::MalformedEmbedding)
    }
}

fn parse_embedding_response(body: &Value) -> Option<VoiceEmbedding> {
    let raw = body.get("embedding")?;
    let mut components = Vec::new();
    collect_components(raw, &mut components)?;
    VoiceEmbedding::new(components).ok()
}

// Depth-first flatten of arbitrarily nested number arrays.
fn collect_components(value: &Value, out: &mut Vec<f32>) -> Option<()> {
    match value {
        Value::Number(n) => {
            out.push(n.as_f64()? as f32);
            Some(())
        }
        Value::Array(items) => {
            for item in items {
                collect_components(item, out)?;
            }
            Some(())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_extract_01_short_sample_refused_before_any_call() {
        let sample = AudioSample::v1(vec![1, 2, 3], 10_000).unwrap();
        assert_eq!(
            ensure_min_duration(&sample),
            Err(ExtractionError::SampleTooShort {
                duration_ms: 10_000,
                min_ms: MIN_SAMPLE_DURATION_MS
            })
        );
        let sample = AudioSample::v1(vec![1, 2, 3], 15_000).unwrap();
        assert_eq!(ensure_min_duration(&sample), Ok(()));
    }

    #[test]
    fn at_extract_02_nested_batch_rows_flattened() {
        let body = serde_json::json!({ "embedding": [[0.25, -0.5], [1.0]] });
        let e = parse_embedding_response(&body).unwrap();
        assert_eq!(e.as_slice(), &[0.25, -0.5, 1.0]);
    }

    #[test]
    fn at_extract_03_flat_array_accepted() {
        let body = serde_json::json!({ "embedding": [0.1, 0.2, 0.3] });
        let e = parse_embedding_response(&body).unwrap();
        assert_eq!(e.dim(), 3);
    }

    #[test]
    fn at_extract_04_non_numeric_payload_is_malformed() {
        assert!(parse_embedding_response(&serde_json::json!({ "embedding": ["x"] })).is_none());
        assert!(parse_embedding_response(&serde_json::json!({ "embedding": [] })).is_none());
        assert!(parse_embedding_response(&serde_json::json!({ "other": [1.0] })).is_none());
    }
}
