#![forbid(unsafe_code)]

use voicenudge_engines::auth_decision::{derive_answer_hash, derive_password_hash};
use voicenudge_engines::extractor::{AudioSample, EmbeddingExtractor, ExtractionError};
use voicenudge_kernel_contracts::auth::{EmailAddress, SecurityQuestion, UserId};
use voicenudge_kernel_contracts::ContractViolation;
use voicenudge_storage::{NudgeStore, StorageError, UserRecord};

use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq)]
pub enum RegisterError {
    EmailTaken,
    Storage(StorageError),
    Contract(ContractViolation),
    Extraction(ExtractionError),
}

impl From<ContractViolation> for RegisterError {
    fn from(e: ContractViolation) -> Self {
        Self::Contract(e)
    }
}

impl From<ExtractionError> for RegisterError {
    fn from(e: ExtractionError) -> Self {
        Self::Extraction(e)
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub display_name: String,
    pub email: EmailAddress,
    pub password: String,
    pub security_question: SecurityQuestion,
    pub security_answer: String,
}

/// Creates an account. Voice enrollment is optional at registration; when a
/// sample is supplied, a failed extraction fails the whole registration
/// rather than silently creating a voiceless account.
pub fn register(
    store: &mut NudgeStore,
    clock: &dyn Clock,
    input: RegisterInput,
    voice_sample: Option<&AudioSample>,
    extractor: &dyn EmbeddingExtractor,
) -> Result<UserId, RegisterError> {
    if store.user_by_email(&input.email).is_some() {
        return Err(RegisterError::EmailTaken);
    }

    let embedding = match voice_sample {
        Some(sample) => Some(extractor.extract(sample)?),
        None => None,
    };

    let user_id = store.next_user_id();
    let record = UserRecord::v1(
        user_id.clone(),
        input.display_name,
        input.email,
        derive_password_hash(&input.password)?,
        embedding,
        Some(input.security_question),
        Some(derive_answer_hash(&input.security_answer)?),
        clock.now(),
    )?;
    store.insert_user(record).map_err(RegisterError::Storage)?;
    Ok(user_id)
}

/// Late enrollment for accounts created without a voice sample.
pub fn enroll_voice(
    store: &mut NudgeStore,
    user_id: &UserId,
    sample: &AudioSample,
    extractor: &dyn EmbeddingExtractor,
) -> Result<(), RegisterError> {
    let embedding = extractor.extract(sample)?;
    store
        .set_voice_embedding(user_id, embedding)
        .map_err(RegisterError::Storage)
}
