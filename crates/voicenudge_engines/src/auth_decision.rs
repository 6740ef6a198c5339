#![forbid(unsafe_code)]

use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use voicenudge_kernel_contracts::auth::{
    AuthDecision, CredentialView, PasswordHash, SecurityAnswerHash, VoiceEmbedding,
};
use voicenudge_kernel_contracts::{ContractViolation, ReasonCodeId};

use crate::embedding::{EmbeddingComparator, SimilarityError};

pub mod reason_codes {
    use voicenudge_kernel_contracts::ReasonCodeId;

    // AUTH reason-code namespace.
    pub const AUTH_OK_PASSWORD_ONLY: ReasonCodeId = ReasonCodeId(0x4155_0001);
    pub const AUTH_OK_VOICE_MATCH: ReasonCodeId = ReasonCodeId(0x4155_0002);
    pub const AUTH_OK_SECURITY_ANSWER: ReasonCodeId = ReasonCodeId(0x4155_0003);
    pub const AUTH_CHALLENGE_VOICE_UNCERTAIN: ReasonCodeId = ReasonCodeId(0x4155_0010);
    pub const AUTH_CHALLENGE_VOICE_LOCKED: ReasonCodeId = ReasonCodeId(0x4155_0011);
    pub const AUTH_CHALLENGE_VOICE_SAMPLE_MISSING: ReasonCodeId = ReasonCodeId(0x4155_0012);
    pub const AUTH_FAIL_INVALID_CREDENTIALS: ReasonCodeId = ReasonCodeId(0x4155_00F1);
    pub const AUTH_FAIL_VOICE_MISMATCH_LOCKED: ReasonCodeId = ReasonCodeId(0x4155_00F2);
    pub const AUTH_FAIL_INCORRECT_ANSWER: ReasonCodeId = ReasonCodeId(0x4155_00F3);
}

/// Deliberately generic: the password/voice path never reveals which factor
/// failed.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "invalid credentials";
pub const VOICE_MISMATCH_LOCKED_MESSAGE: &str = "voice mismatch, account locked";
/// The security-answer path may be specific; the question was already
/// disclosed to the caller.
pub const INCORRECT_ANSWER_MESSAGE: &str = "incorrect security answer";

const HASH_SCHEME: &str = "v1";
const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuthPolicyConfig {
    /// Score at or above which the voice factor authenticates outright.
    pub accept_threshold: f32,
    /// Score at or above which (but below accept) the security question is
    /// offered instead of locking.
    pub challenge_threshold: f32,
}

impl AuthPolicyConfig {
    pub fn mvp_v1() -> Self {
        Self {
            accept_threshold: 0.75,
            challenge_threshold: 0.55,
        }
    }

    pub fn validate(&self) -> Result<(), ContractViolation> {
        if !self.accept_threshold.is_finite() || !self.challenge_threshold.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "auth_policy.thresholds",
            });
        }
        if !(0.0..=1.0).contains(&self.accept_threshold) {
            return Err(ContractViolation::InvalidRange {
                field: "auth_policy.accept_threshold",
                min: 0.0,
                max: 1.0,
                got: f64::from(self.accept_threshold),
            });
        }
        if self.challenge_threshold <= 0.0 || self.challenge_threshold >= self.accept_threshold {
            return Err(ContractViolation::InvalidValue {
                field: "auth_policy.challenge_threshold",
                reason: "must be in (0, accept_threshold)",
            });
        }
        Ok(())
    }
}

/// Salted SHA-256, encoded as `v1$<salt_b64>$<digest_b64>`.
pub fn derive_password_hash(password: &str) -> Result<PasswordHash, ContractViolation> {
    if password.is_empty() {
        return Err(ContractViolation::InvalidValue {
            field: "password",
            reason: "must not be empty",
        });
    }
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    PasswordHash::new(encode_salted_digest(&salt, password.as_bytes()))
}

pub fn verify_password(stored: &PasswordHash, presented: &str) -> bool {
    verify_salted_digest(stored.as_str(), presented.as_bytes())
}

/// Case- and whitespace-insensitive canonical form used for both hashing and
/// verification of security answers.
pub fn normalize_security_answer(answer: &str) -> String {
    answer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn derive_answer_hash(answer: &str) -> Result<SecurityAnswerHash, ContractViolation> {
    let normalized = normalize_security_answer(answer);
    if normalized.is_empty() {
        return Err(ContractViolation::InvalidValue {
            field: "security_answer",
            reason: "must not be empty",
        });
    }
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    SecurityAnswerHash::new(encode_salted_digest(&salt, normalized.as_bytes()))
}

pub fn verify_security_answer(stored: &SecurityAnswerHash, presented: &str) -> bool {
    let normalized = normalize_security_answer(presented);
    if normalized.is_empty() {
        return false;
    }
    verify_salted_digest(stored.as_str(), normalized.as_bytes())
}

fn encode_salted_digest(salt: &[u8], payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(payload);
    let digest = hasher.finalize();
    format!(
        "{HASH_SCHEME}${}${}",
        B64.encode(salt),
        B64.encode(digest)
    )
}

fn verify_salted_digest(encoded: &str, payload: &[u8]) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(salt_b64), Some(digest_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(salt) = B64.decode(salt_b64) else {
        return false;
    };
    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(payload);
    let digest = hasher.finalize();
    B64.encode(digest) == digest_b64
}

/// State machine over one login attempt. Pure: the only persisted side
/// effect in the flow (setting the voice lock on a RejectedLocked decision)
/// is carried out by the caller.
#[derive(Debug, Clone)]
pub struct AuthDecisionEngine {
    config: AuthPolicyConfig,
}

impl AuthDecisionEngine {
    pub fn new(config: AuthPolicyConfig) -> Result<Self, ContractViolation> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> AuthPolicyConfig {
        self.config
    }

    /// Decision ladder: password gate, enrollment gate, lock gate, then the
    /// threshold bands over the similarity score.
    pub fn decide(
        &self,
        credential: &CredentialView,
        presented_password: &str,
        presented_embedding: Option<&VoiceEmbedding>,
    ) -> Result<AuthDecision, SimilarityError> {
        if !verify_password(&credential.password_hash, presented_password) {
            return Ok(AuthDecision::RejectedInvalid {
                message: INVALID_CREDENTIALS_MESSAGE,
            });
        }

        // First-time users authenticate on password alone until a voice
        // profile is enrolled. Callers see voice_enrolled=false and prompt.
        let Some(stored_embedding) = &credential.voice_embedding else {
            return Ok(AuthDecision::Authenticated {
                score: None,
                voice_enrolled: false,
            });
        };

        // Lockout blocks only the voice factor; recovery via the security
        // question must stay open.
        if credential.voice_locked {
            return Ok(self.challenge_or_locked(credential));
        }

        let Some(presented) = presented_embedding else {
            return Ok(self.challenge_or_invalid(credential));
        };

        let score = EmbeddingComparator::cosine_similarity(presented, stored_embedding)?;
        if score >= self.config.accept_threshold {
            Ok(AuthDecision::Authenticated {
                score: Some(score),
                voice_enrolled: true,
            })
        } else if score >= self.config.challenge_threshold {
            Ok(self.challenge_or_invalid(credential))
        } else {
            Ok(AuthDecision::RejectedLocked {
                message: VOICE_MISMATCH_LOCKED_MESSAGE,
            })
        }
    }

    /// Fallback verification once the question has been disclosed.
    pub fn check_security_answer(
        &self,
        credential: &CredentialView,
        presented_answer: &str,
    ) -> AuthDecision {
        let Some(stored) = &credential.security_answer_hash else {
            return AuthDecision::RejectedInvalid {
                message: INVALID_CREDENTIALS_MESSAGE,
            };
        };
        if verify_security_answer(stored, presented_answer) {
            AuthDecision::Authenticated {
                score: None,
                voice_enrolled: credential.voice_embedding.is_some(),
            }
        } else {
            AuthDecision::RejectedInvalid {
                message: INCORRECT_ANSWER_MESSAGE,
            }
        }
    }

    fn challenge_or_invalid(&self, credential: &CredentialView) -> AuthDecision {
        match &credential.security_question {
            Some(question) => AuthDecision::ChallengeRequired {
                question: question.clone(),
            },
            None => AuthDecision::RejectedInvalid {
                message: INVALID_CREDENTIALS_MESSAGE,
            },
        }
    }

    fn challenge_or_locked(&self, credential: &CredentialView) -> AuthDecision {
        match &credential.security_question {
            Some(question) => AuthDecision::ChallengeRequired {
                question: question.clone(),
            },
            None => AuthDecision::RejectedLocked {
                message: VOICE_MISMATCH_LOCKED_MESSAGE,
            },
        }
    }
}

/// What the decision alone cannot tell the log line: whether the account was
/// already locked and whether a sample came with the attempt.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext {
    pub voice_locked: bool,
    pub sample_presented: bool,
}

/// Stable observability mapping for login decisions. Challenge causes are
/// kept apart: an already-locked account, a missing sample, and a gray-zone
/// score each get their own code.
pub fn decision_reason_code(decision: &AuthDecision, context: DecisionContext) -> ReasonCodeId {
    match decision {
        AuthDecision::Authenticated {
            score: Some(_), ..
        } => reason_codes::AUTH_OK_VOICE_MATCH,
        AuthDecision::Authenticated { score: None, .. } => reason_codes::AUTH_OK_PASSWORD_ONLY,
        AuthDecision::ChallengeRequired { .. } if context.voice_locked => {
            reason_codes::AUTH_CHALLENGE_VOICE_LOCKED
        }
        AuthDecision::ChallengeRequired { .. } if !context.sample_presented => {
            reason_codes::AUTH_CHALLENGE_VOICE_SAMPLE_MISSING
        }
        AuthDecision::ChallengeRequired { .. } => reason_codes::AUTH_CHALLENGE_VOICE_UNCERTAIN,
        AuthDecision::RejectedInvalid { .. } => reason_codes::AUTH_FAIL_INVALID_CREDENTIALS,
        AuthDecision::RejectedLocked { .. } => reason_codes::AUTH_FAIL_VOICE_MISMATCH_LOCKED,
    }
}

/// Reason codes for the security-answer fallback path.
pub fn answer_reason_code(decision: &AuthDecision) -> ReasonCodeId {
    match decision {
        AuthDecision::Authenticated { .. } => reason_codes::AUTH_OK_SECURITY_ANSWER,
        _ => reason_codes::AUTH_FAIL_INCORRECT_ANSWER,
    }
}
