#![forbid(unsafe_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use voicenudge_engines::auth_decision::{
    answer_reason_code, decision_reason_code, AuthDecisionEngine, AuthPolicyConfig,
    DecisionContext, INVALID_CREDENTIALS_MESSAGE,
};
use voicenudge_engines::embedding::SimilarityError;
use voicenudge_kernel_contracts::auth::{
    AuthDecision, EmailAddress, SecurityQuestion, SessionToken, UserId, VoiceEmbedding,
};
use voicenudge_kernel_contracts::ContractViolation;
use voicenudge_storage::{NudgeStore, SessionRecord, StorageError};

use crate::clock::Clock;

const SESSION_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum LoginError {
    Storage(StorageError),
    Similarity(SimilarityError),
    Contract(ContractViolation),
}

impl From<StorageError> for LoginError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<SimilarityError> for LoginError {
    fn from(e: SimilarityError) -> Self {
        Self::Similarity(e)
    }
}

impl From<ContractViolation> for LoginError {
    fn from(e: ContractViolation) -> Self {
        Self::Contract(e)
    }
}

/// Transport-independent outcome of a login or recovery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    Session {
        token: SessionToken,
        user_id: UserId,
        score: Option<f32>,
        voice_enrolled: bool,
    },
    Challenge {
        question: SecurityQuestion,
    },
    RejectedInvalid {
        message: &'static str,
    },
    RejectedLocked {
        message: &'static str,
    },
}

/// Orchestrates a login attempt: loads the credential, runs the decision
/// engine, and persists what the decision demands (session on success, lock
/// on a lock-demanding rejection).
#[derive(Debug, Clone)]
pub struct LoginFlow {
    engine: AuthDecisionEngine,
}

impl LoginFlow {
    pub fn new(config: AuthPolicyConfig) -> Result<Self, ContractViolation> {
        Ok(Self {
            engine: AuthDecisionEngine::new(config)?,
        })
    }

    pub fn login(
        &self,
        store: &mut NudgeStore,
        clock: &dyn Clock,
        email: &EmailAddress,
        password: &str,
        presented_embedding: Option<&VoiceEmbedding>,
    ) -> Result<LoginOutcome, LoginError> {
        // An unknown email and a wrong password are indistinguishable.
        let Some(user) = store.user_by_email(email) else {
            return Ok(LoginOutcome::RejectedInvalid {
                message: INVALID_CREDENTIALS_MESSAGE,
            });
        };
        let user_id = user.user_id.clone();
        let credential = user.credential_view()?;

        let decision = self
            .engine
            .decide(&credential, password, presented_embedding)?;
        let reason = decision_reason_code(
            &decision,
            DecisionContext {
                voice_locked: credential.voice_locked,
                sample_presented: presented_embedding.is_some(),
            },
        );
        println!(
            "login: user={} reason_code={:#010x}",
            user_id.as_str(),
            reason.0
        );
        match decision {
            AuthDecision::Authenticated {
                score,
                voice_enrolled,
            } => {
                let token = issue_session(store, clock, &user_id)?;
                Ok(LoginOutcome::Session {
                    token,
                    user_id,
                    score,
                    voice_enrolled,
                })
            }
            AuthDecision::ChallengeRequired { question } => {
                Ok(LoginOutcome::Challenge { question })
            }
            AuthDecision::RejectedInvalid { message } => {
                Ok(LoginOutcome::RejectedInvalid { message })
            }
            AuthDecision::RejectedLocked { message } => {
                store.set_voice_locked(&user_id, true)?;
                Ok(LoginOutcome::RejectedLocked { message })
            }
        }
    }

    /// Security-question fallback. A correct answer issues a session; the
    /// voice lock, if set, stays until an operator clears it.
    pub fn verify_security(
        &self,
        store: &mut NudgeStore,
        clock: &dyn Clock,
        email: &EmailAddress,
        answer: &str,
    ) -> Result<LoginOutcome, LoginError> {
        let Some(user) = store.user_by_email(email) else {
            return Ok(LoginOutcome::RejectedInvalid {
                message: INVALID_CREDENTIALS_MESSAGE,
            });
        };
        let user_id = user.user_id.clone();
        let credential = user.credential_view()?;

        let decision = self.engine.check_security_answer(&credential, answer);
        println!(
            "login: user={} recovery reason_code={:#010x}",
            user_id.as_str(),
            answer_reason_code(&decision).0
        );
        match decision {
            AuthDecision::Authenticated {
                score,
                voice_enrolled,
            } => {
                let token = issue_session(store, clock, &user_id)?;
                Ok(LoginOutcome::Session {
                    token,
                    user_id,
                    score,
                    voice_enrolled,
                })
            }
            AuthDecision::RejectedInvalid { message } => {
                Ok(LoginOutcome::RejectedInvalid { message })
            }
            other => unreachable_decision(other),
        }
    }

    pub fn security_question(
        &self,
        store: &NudgeStore,
        email: &EmailAddress,
    ) -> Option<SecurityQuestion> {
        store
            .user_by_email(email)
            .and_then(|u| u.security_question.clone())
    }
}

/// Clears a voice lock. Exposed for the operator-facing unlock surface, not
/// reachable from any login path.
pub fn admin_unlock_voice(store: &mut NudgeStore, user_id: &UserId) -> Result<(), StorageError> {
    store.set_voice_locked(user_id, false)
}

pub fn logout(store: &mut NudgeStore, token: &SessionToken) -> bool {
    store.delete_session(token)
}

fn issue_session(
    store: &mut NudgeStore,
    clock: &dyn Clock,
    user_id: &UserId,
) -> Result<SessionToken, LoginError> {
    let mut raw = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut raw);
    let token = SessionToken::new(URL_SAFE_NO_PAD.encode(raw))?;
    store.insert_session(SessionRecord::v1(
        token.clone(),
        user_id.clone(),
        clock.now(),
    ))?;
    Ok(token)
}

fn unreachable_decision(decision: AuthDecision) -> Result<LoginOutcome, LoginError> {
    // check_security_answer only returns Authenticated or RejectedInvalid.
    debug_assert!(false, "unexpected security-answer decision: {decision:?}");
    Ok(LoginOutcome::RejectedInvalid {
        message: INVALID_CREDENTIALS_MESSAGE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use voicenudge_engines::auth_decision::{derive_answer_hash, derive_password_hash};
    use voicenudge_kernel_contracts::auth::SecurityAnswerHash;
    use voicenudge_kernel_contracts::UtcTimestamp;
    use voicenudge_storage::UserRecord;

    fn t(secs: i64) -> UtcTimestamp {
        UtcTimestamp::from_unix_seconds(secs).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(t(1_000))
    }

    fn flow() -> LoginFlow {
        LoginFlow::new(AuthPolicyConfig::mvp_v1()).unwrap()
    }

    fn seeded_store(embedding: Option<VoiceEmbedding>) -> (NudgeStore, UserId, EmailAddress) {
        let mut s = NudgeStore::new_in_memory();
        let user_id = s.next_user_id();
        let email = EmailAddress::new("tommy@example.com").unwrap();
        let answer: SecurityAnswerHash = derive_answer_hash("Rex").unwrap();
        s.insert_user(
            UserRecord::v1(
                user_id.clone(),
                "Tommy".to_string(),
                email.clone(),
                derive_password_hash("hunter2").unwrap(),
                embedding,
                Some(SecurityQuestion::new("First pet?").unwrap()),
                Some(answer),
                t(1),
            )
            .unwrap(),
        )
        .unwrap();
        (s, user_id, email)
    }

    fn stored_unit() -> VoiceEmbedding {
        VoiceEmbedding::new(vec![1.0, 0.0]).unwrap()
    }

    fn presented_with_score(score: f32) -> VoiceEmbedding {
        VoiceEmbedding::new(vec![score, (1.0 - score * score).sqrt()]).unwrap()
    }

    #[test]
    fn at_login_01_unknown_email_indistinguishable_from_bad_password() {
        let (mut s, _, _) = seeded_store(None);
        let ghost = EmailAddress::new("ghost@example.com").unwrap();
        let out = flow()
            .login(&mut s, &clock(), &ghost, "whatever", None)
            .unwrap();
        assert_eq!(
            out,
            LoginOutcome::RejectedInvalid {
                message: INVALID_CREDENTIALS_MESSAGE
            }
        );
    }

    #[test]
    fn at_login_02_password_only_session_when_not_enrolled() {
        let (mut s, user_id, email) = seeded_store(None);
        let out = flow()
            .login(&mut s, &clock(), &email, "hunter2", None)
            .unwrap();
        match out {
            LoginOutcome::Session {
                token,
                user_id: got,
                score,
                voice_enrolled,
            } => {
                assert_eq!(got, user_id);
                assert_eq!(score, None);
                assert!(!voice_enrolled);
                assert!(s.session(&token).is_some());
            }
            other => panic!("expected session, got {other:?}"),
        }
    }

    #[test]
    fn at_login_03_low_score_persists_lock() {
        let (mut s, user_id, email) = seeded_store(Some(stored_unit()));
        let presented = presented_with_score(0.40);
        let out = flow()
            .login(&mut s, &clock(), &email, "hunter2", Some(&presented))
            .unwrap();
        assert!(matches!(out, LoginOutcome::RejectedLocked { .. }));
        assert!(s.user(&user_id).unwrap().voice_locked);
    }

    #[test]
    fn at_login_04_locked_account_challenges_then_recovers_via_answer() {
        let (mut s, user_id, email) = seeded_store(Some(stored_unit()));
        s.set_voice_locked(&user_id, true).unwrap();
        let f = flow();

        let presented = presented_with_score(0.99);
        let out = f
            .login(&mut s, &clock(), &email, "hunter2", Some(&presented))
            .unwrap();
        assert!(matches!(out, LoginOutcome::Challenge { .. }));

        let out = f
            .verify_security(&mut s, &clock(), &email, " rex ")
            .unwrap();
        assert!(matches!(out, LoginOutcome::Session { .. }));
        // Recovery does not clear the lock.
        assert!(s.user(&user_id).unwrap().voice_locked);
    }

    #[test]
    fn at_login_05_wrong_answer_rejected_without_session() {
        let (mut s, _, email) = seeded_store(Some(stored_unit()));
        let out = flow()
            .verify_security(&mut s, &clock(), &email, "goldfish")
            .unwrap();
        assert!(matches!(out, LoginOutcome::RejectedInvalid { .. }));
    }

    #[test]
    fn at_login_06_admin_unlock_reopens_voice_path() {
        let (mut s, user_id, email) = seeded_store(Some(stored_unit()));
        s.set_voice_locked(&user_id, true).unwrap();
        admin_unlock_voice(&mut s, &user_id).unwrap();

        let presented = presented_with_score(0.99);
        let out = flow()
            .login(&mut s, &clock(), &email, "hunter2", Some(&presented))
            .unwrap();
        assert!(matches!(
            out,
            LoginOutcome::Session { score: Some(_), .. }
        ));
    }

    #[test]
    fn at_login_07_logout_consumes_session() {
        let (mut s, _, email) = seeded_store(None);
        let out = flow()
            .login(&mut s, &clock(), &email, "hunter2", None)
            .unwrap();
        let LoginOutcome::Session { token, .. } = out else {
            panic!("expected session");
        };
        assert!(logout(&mut s, &token));
        assert!(!logout(&mut s, &token));
    }
}
