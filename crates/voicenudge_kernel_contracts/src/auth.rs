#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::validate_token;
use crate::{ContractViolation, SchemaVersion, Validate};

pub const AUTH_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Practical cap on embedding dimensionality (ECAPA-style extractors emit 192).
pub const MAX_EMBEDDING_DIM: usize = 4_096;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for UserId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("user_id", &self.0, 128)
    }
}

/// Lower-cased, trimmed email address. Uniqueness is enforced by the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(raw.into().trim().to_ascii_lowercase());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for EmailAddress {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("email_address", &self.0, 254)?;
        let Some((local, domain)) = self.0.split_once('@') else {
            return Err(ContractViolation::InvalidValue {
                field: "email_address",
                reason: "must contain '@'",
            });
        };
        if local.is_empty() || domain.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "email_address",
                reason: "local part and domain must be non-empty",
            });
        }
        Ok(())
    }
}

/// Opaque salted-digest string produced by the auth engine. Format is an
/// engine concern; contracts only guard shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(encoded: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(encoded.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for PasswordHash {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("password_hash", &self.0, 256)?;
        if !self.0.is_ascii() {
            return Err(ContractViolation::InvalidValue {
                field: "password_hash",
                reason: "must be ASCII",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityQuestion(String);

impl SecurityQuestion {
    pub fn new(text: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(text.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SecurityQuestion {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("security_question", &self.0, 256)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAnswerHash(String);

impl SecurityAnswerHash {
    pub fn new(encoded: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(encoded.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SecurityAnswerHash {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("security_answer_hash", &self.0, 256)?;
        if !self.0.is_ascii() {
            return Err(ContractViolation::InvalidValue {
                field: "security_answer_hash",
                reason: "must be ASCII",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(token.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for SessionToken {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_token("session_token", &self.0, 128)?;
        if !self.0.is_ascii() {
            return Err(ContractViolation::InvalidValue {
                field: "session_token",
                reason: "must be ASCII",
            });
        }
        Ok(())
    }
}

/// Fixed-length float vector describing a voice's acoustic identity.
/// Components must be finite; nested model output is flattened on entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEmbedding {
    components: Vec<f32>,
}

impl VoiceEmbedding {
    pub fn new(components: Vec<f32>) -> Result<Self, ContractViolation> {
        let v = Self { components };
        v.validate()?;
        Ok(v)
    }

    /// Flattens row-major nested extractor output (e.g. a `[[f32; N]]`
    /// batch of one) into a flat vector.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, ContractViolation> {
        Self::new(rows.into_iter().flatten().collect())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.components
    }

    pub fn dim(&self) -> usize {
        self.components.len()
    }
}

impl Validate for VoiceEmbedding {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.components.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "voice_embedding.components",
                reason: "must not be empty",
            });
        }
        if self.components.len() > MAX_EMBEDDING_DIM {
            return Err(ContractViolation::InvalidValue {
                field: "voice_embedding.components",
                reason: "exceeds max dimensionality",
            });
        }
        if self.components.iter().any(|c| !c.is_finite()) {
            return Err(ContractViolation::NotFinite {
                field: "voice_embedding.components",
            });
        }
        Ok(())
    }
}

/// Read-only view of one identity's stored credential, as consumed by the
/// auth decision engine. The engine never mutates this; the lock flag is
/// persisted by the orchestration layer when a decision demands it.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialView {
    pub schema_version: SchemaVersion,
    pub user_id: UserId,
    pub password_hash: PasswordHash,
    pub voice_embedding: Option<VoiceEmbedding>,
    pub security_question: Option<SecurityQuestion>,
    pub security_answer_hash: Option<SecurityAnswerHash>,
    pub voice_locked: bool,
}

impl CredentialView {
    pub fn v1(
        user_id: UserId,
        password_hash: PasswordHash,
        voice_embedding: Option<VoiceEmbedding>,
        security_question: Option<SecurityQuestion>,
        security_answer_hash: Option<SecurityAnswerHash>,
        voice_locked: bool,
    ) -> Result<Self, ContractViolation> {
        let v = Self {
            schema_version: AUTH_CONTRACT_VERSION,
            user_id,
            password_hash,
            voice_embedding,
            security_question,
            security_answer_hash,
            voice_locked,
        };
        v.validate()?;
        Ok(v)
    }
}

impl Validate for CredentialView {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != AUTH_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "credential_view.schema_version",
                reason: "must match AUTH_CONTRACT_VERSION",
            });
        }
        self.user_id.validate()?;
        self.password_hash.validate()?;
        if let Some(e) = &self.voice_embedding {
            e.validate()?;
        }
        if let Some(q) = &self.security_question {
            q.validate()?;
        }
        if let Some(a) = &self.security_answer_hash {
            a.validate()?;
        }
        // A question without an answer hash (or vice versa) cannot be
        // challenged against.
        if self.security_question.is_some() != self.security_answer_hash.is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "credential_view.security_question",
                reason: "question and answer hash must be stored together",
            });
        }
        Ok(())
    }
}

/// Transport-independent outcome of one login decision.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthDecision {
    Authenticated {
        /// Voice-similarity score when the voice factor was evaluated.
        score: Option<f32>,
        /// False on the password-only path so callers can prompt enrollment.
        voice_enrolled: bool,
    },
    ChallengeRequired {
        question: SecurityQuestion,
    },
    RejectedInvalid {
        message: &'static str,
    },
    RejectedLocked {
        message: &'static str,
    },
}
