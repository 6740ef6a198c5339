#![forbid(unsafe_code)]

use std::env;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use voicenudge_engines::auth_decision::AuthPolicyConfig;
use voicenudge_engines::classify::{KeywordCategoryClassifier, KeywordPriorityClassifier};
use voicenudge_engines::due_time::DueTimeConfig;
use voicenudge_engines::extractor::{
    AudioSample, EmbeddingExtractor, ExtractionError, HttpEmbeddingExtractor,
};
use voicenudge_engines::mailer::{EmailMessage, HttpMailRelay, NotificationSender, SendError};
use voicenudge_engines::provider::ProviderCallError;
use voicenudge_engines::secret_vault;
use voicenudge_engines::transcriber::{HttpTranscriber, TranscribeError, Transcriber};
use voicenudge_kernel_contracts::auth::{EmailAddress, SecurityQuestion, SessionToken, UserId};
use voicenudge_kernel_contracts::provider_secrets::ProviderSecretId;
use voicenudge_kernel_contracts::task::TaskId;
use voicenudge_os::history::{self, HistorySource};
use voicenudge_os::login::{admin_unlock_voice, LoginFlow, LoginOutcome};
use voicenudge_os::register::{self, RegisterError, RegisterInput};
use voicenudge_os::reminder_scan::{ReminderScanConfig, ReminderScanner};
use voicenudge_os::tasks::{TaskFlowError, TaskFlows};
use voicenudge_os::{Clock, SystemClock};
use voicenudge_storage::NudgeStore;

const PROVIDER_TIMEOUT_MS: u32 = 10_000;
const ADAPTER_USER_AGENT: &str = "voicenudge_adapter/0.1";

// ---- wire DTOs ----

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisterAdapterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub security_question: String,
    pub security_answer: String,
    pub voice_audio_b64: Option<String>,
    pub voice_duration_ms: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisterAdapterResponse {
    pub status: String,
    pub user_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoginAdapterRequest {
    pub email: String,
    pub password: String,
    pub voice_audio_b64: Option<String>,
    pub voice_duration_ms: Option<u32>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoginAdapterResponse {
    pub status: String,
    pub outcome: String,
    pub token: Option<String>,
    pub user_id: Option<String>,
    pub score: Option<f32>,
    pub voice_enrolled: Option<bool>,
    pub security_question: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VerifySecurityAdapterRequest {
    pub email: String,
    pub answer: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SecurityQuestionAdapterRequest {
    pub email: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SecurityQuestionAdapterResponse {
    pub status: String,
    pub security_question: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionAdapterRequest {
    pub token: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MeAdapterResponse {
    pub status: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub voice_enrolled: bool,
    pub voice_locked: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LogoutAdapterResponse {
    pub status: String,
    pub session_removed: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IngestTextAdapterRequest {
    pub token: String,
    pub text: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IngestVoiceAdapterRequest {
    pub token: String,
    pub audio_b64: String,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TaskIngestAdapterResponse {
    pub status: String,
    pub task_id: String,
    pub title: String,
    pub due_at_utc: Option<String>,
    pub category: String,
    pub priority: String,
    pub needs_due_date: bool,
    pub transcribed_text: Option<String>,
    pub original_text: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SetDueAdapterRequest {
    pub token: String,
    pub task_id: String,
    /// Local wall-clock time, e.g. "2025-01-10T18:30:00".
    pub due_local: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SetDueAdapterResponse {
    pub status: String,
    pub due_at_utc: String,
    pub remind_at_utc: String,
    pub reminder_id: String,
    pub calendar_link: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompleteTaskAdapterRequest {
    pub token: String,
    pub task_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompleteTaskAdapterResponse {
    pub status: String,
    pub history_id: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TaskRowAdapter {
    pub task_id: String,
    pub title: String,
    pub text: String,
    pub due_at_utc: Option<String>,
    pub category: String,
    pub priority: String,
    pub status: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TaskListAdapterResponse {
    pub status: String,
    pub tasks: Vec<TaskRowAdapter>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HistoryRowAdapter {
    pub id: String,
    pub title: String,
    pub due_at_utc: Option<String>,
    pub category: String,
    pub priority: String,
    pub source: String,
    pub completed_at_utc: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HistoryListAdapterResponse {
    pub status: String,
    pub entries: Vec<HistoryRowAdapter>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClearHistoryAdapterResponse {
    pub status: String,
    pub removed: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdminUnlockAdapterRequest {
    pub admin_token: String,
    pub email: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdminUnlockAdapterResponse {
    pub status: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
pub struct ScanWorkerCounters {
    pub pass_count: u64,
    pub due_seen_total: u64,
    pub delivered_total: u64,
    pub send_failed_total: u64,
    pub quarantined_total: u64,
    pub audit_failed_total: u64,
    pub last_pass_at_unix: Option<i64>,
    pub last_due_seen: usize,
    pub last_delivered: usize,
    pub last_send_failed: usize,
    pub last_quarantined: usize,
    pub last_audit_failed: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub outcome: String,
    pub reason: Option<String>,
    pub scan: ScanWorkerCounters,
}

// ---- fallback collaborators ----

/// Stands in for the mail relay when no endpoint is configured; the scan
/// pass still marks rows sent, so deliveries are logged rather than dropped
/// and retried forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyMailer;

impl NotificationSender for LogOnlyMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        println!(
            "voicenudge_adapter mail (log only) to={} subject={:?}",
            message.to.as_str(),
            message.subject
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredExtractor;

impl EmbeddingExtractor for UnconfiguredExtractor {
    fn extract(&self, _sample: &AudioSample) -> Result<voicenudge_kernel_contracts::auth::VoiceEmbedding, ExtractionError> {
        Err(ExtractionError::Provider(ProviderCallError::new(
            "voice_embedding",
            "unconfigured",
            None,
        )))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTranscriber;

impl Transcriber for UnconfiguredTranscriber {
    fn transcribe(
        &self,
        _sample: &AudioSample,
        _translate_to_english: bool,
    ) -> Result<String, TranscribeError> {
        Err(TranscribeError::Provider(ProviderCallError::new(
            "transcriber",
            "unconfigured",
            None,
        )))
    }
}

// ---- runtime ----

pub struct AdapterRuntime {
    store: Arc<Mutex<NudgeStore>>,
    clock: SystemClock,
    login_flow: LoginFlow,
    task_flows: TaskFlows,
    scanner: ReminderScanner,
    extractor: Box<dyn EmbeddingExtractor + Send>,
    transcriber: Box<dyn Transcriber + Send>,
    mailer: Box<dyn NotificationSender + Send>,
    category: KeywordCategoryClassifier,
    priority: KeywordPriorityClassifier,
    scan_counters: Arc<Mutex<ScanWorkerCounters>>,
    admin_unlock_token: Option<String>,
}

impl AdapterRuntime {
    pub fn new(
        extractor: Box<dyn EmbeddingExtractor + Send>,
        transcriber: Box<dyn Transcriber + Send>,
        mailer: Box<dyn NotificationSender + Send>,
        admin_unlock_token: Option<String>,
    ) -> Result<Self, String> {
        Ok(Self {
            store: Arc::new(Mutex::new(NudgeStore::new_in_memory())),
            clock: SystemClock,
            login_flow: LoginFlow::new(AuthPolicyConfig::mvp_v1()).map_err(err_string)?,
            task_flows: TaskFlows::new(DueTimeConfig::mvp_v1()).map_err(err_string)?,
            scanner: ReminderScanner::new(ReminderScanConfig::mvp_v1()).map_err(err_string)?,
            extractor,
            transcriber,
            mailer,
            category: KeywordCategoryClassifier,
            priority: KeywordPriorityClassifier,
            scan_counters: Arc::new(Mutex::new(ScanWorkerCounters::default())),
            admin_unlock_token,
        })
    }

    /// Wires real provider clients from environment endpoints plus the local
    /// secret vault; missing configuration degrades to the log-only or
    /// unconfigured stand-ins rather than refusing to start.
    pub fn default_from_env() -> Result<Self, String> {
        let mailer: Box<dyn NotificationSender + Send> = match (
            env::var("VOICENUDGE_MAIL_RELAY_URL").ok(),
            resolve_provider_secret(ProviderSecretId::MailRelayApiKey, "VOICENUDGE_MAIL_RELAY_API_KEY"),
            env::var("VOICENUDGE_MAIL_FROM")
                .ok()
                .and_then(|raw| EmailAddress::new(&raw).ok()),
        ) {
            (Some(endpoint), Some(api_key), Some(from)) => Box::new(HttpMailRelay::new(
                endpoint,
                api_key,
                from,
                PROVIDER_TIMEOUT_MS,
                ADAPTER_USER_AGENT,
            )),
            _ => {
                eprintln!("voicenudge_adapter: mail relay not configured, using log-only mailer");
                Box::new(LogOnlyMailer)
            }
        };

        let extractor: Box<dyn EmbeddingExtractor + Send> = match (
            env::var("VOICENUDGE_EMBEDDING_URL").ok(),
            resolve_provider_secret(
                ProviderSecretId::VoiceEmbeddingApiKey,
                "VOICENUDGE_EMBEDDING_API_KEY",
            ),
        ) {
            (Some(endpoint), Some(api_key)) => Box::new(HttpEmbeddingExtractor::new(
                endpoint,
                api_key,
                PROVIDER_TIMEOUT_MS,
                ADAPTER_USER_AGENT,
            )),
            _ => Box::new(UnconfiguredExtractor),
        };

        let transcriber: Box<dyn Transcriber + Send> = match (
            env::var("VOICENUDGE_TRANSCRIBER_URL").ok(),
            resolve_provider_secret(
                ProviderSecretId::TranscriberApiKey,
                "VOICENUDGE_TRANSCRIBER_API_KEY",
            ),
        ) {
            (Some(endpoint), Some(api_key)) => Box::new(HttpTranscriber::new(
                endpoint,
                api_key,
                PROVIDER_TIMEOUT_MS,
                ADAPTER_USER_AGENT,
            )),
            _ => Box::new(UnconfiguredTranscriber),
        };

        let admin_unlock_token =
            resolve_provider_secret(ProviderSecretId::AdminUnlockToken, "VOICENUDGE_ADMIN_TOKEN");
        Self::new(extractor, transcriber, mailer, admin_unlock_token)
    }

    // ---- identity ----

    pub fn register(
        &self,
        request: RegisterAdapterRequest,
    ) -> Result<RegisterAdapterResponse, String> {
        let email = EmailAddress::new(&request.email).map_err(err_string)?;
        let question = SecurityQuestion::new(&request.security_question).map_err(err_string)?;
        let sample = decode_optional_sample(request.voice_audio_b64, request.voice_duration_ms)?;

        let mut store = self.lock_store()?;
        let user_id = register::register(
            &mut store,
            &self.clock,
            RegisterInput {
                display_name: request.name,
                email,
                password: request.password,
                security_question: question,
                security_answer: request.security_answer,
            },
            sample.as_ref(),
            &*self.extractor,
        )
        .map_err(register_error_to_string)?;
        Ok(RegisterAdapterResponse {
            status: "ok".to_string(),
            user_id: user_id.as_str().to_string(),
        })
    }

    pub fn login(&self, request: LoginAdapterRequest) -> Result<LoginAdapterResponse, String> {
        let email = EmailAddress::new(&request.email).map_err(err_string)?;
        let sample = decode_optional_sample(request.voice_audio_b64, request.voice_duration_ms)?;
        let presented = match &sample {
            Some(sample) => Some(self.extractor.extract(sample).map_err(err_string)?),
            None => None,
        };

        let mut store = self.lock_store()?;
        let outcome = self
            .login_flow
            .login(
                &mut store,
                &self.clock,
                &email,
                &request.password,
                presented.as_ref(),
            )
            .map_err(err_string)?;
        Ok(login_outcome_to_response(outcome))
    }

    pub fn security_question(
        &self,
        request: SecurityQuestionAdapterRequest,
    ) -> Result<SecurityQuestionAdapterResponse, String> {
        let email = EmailAddress::new(&request.email).map_err(err_string)?;
        let store = self.lock_store()?;
        Ok(SecurityQuestionAdapterResponse {
            status: "ok".to_string(),
            security_question: self
                .login_flow
                .security_question(&store, &email)
                .map(|q| q.as_str().to_string()),
        })
    }

    pub fn verify_security(
        &self,
        request: VerifySecurityAdapterRequest,
    ) -> Result<LoginAdapterResponse, String> {
        let email = EmailAddress::new(&request.email).map_err(err_string)?;
        let mut store = self.lock_store()?;
        let outcome = self
            .login_flow
            .verify_security(&mut store, &self.clock, &email, &request.answer)
            .map_err(err_string)?;
        Ok(login_outcome_to_response(outcome))
    }

    pub fn me(&self, request: SessionAdapterRequest) -> Result<MeAdapterResponse, String> {
        let store = self.lock_store()?;
        let user_id = authed_user(&store, &request.token)?;
        let user = store
            .user(&user_id)
            .ok_or_else(|| "session user no longer exists".to_string())?;
        Ok(MeAdapterResponse {
            status: "ok".to_string(),
            user_id: user.user_id.as_str().to_string(),
            name: user.display_name.clone(),
            email: user.email.as_str().to_string(),
            voice_enrolled: user.voice_embedding.is_some(),
            voice_locked: user.voice_locked,
        })
    }

    pub fn logout(&self, request: SessionAdapterRequest) -> Result<LogoutAdapterResponse, String> {
        let token = SessionToken::new(&request.token).map_err(err_string)?;
        let mut store = self.lock_store()?;
        Ok(LogoutAdapterResponse {
            status: "ok".to_string(),
            session_removed: voicenudge_os::login::logout(&mut store, &token),
        })
    }

    pub fn admin_unlock(
        &self,
        request: AdminUnlockAdapterRequest,
    ) -> Result<AdminUnlockAdapterResponse, String> {
        let Some(expected) = self.admin_unlock_token.as_deref() else {
            return Err("admin unlock is not configured".to_string());
        };
        if request.admin_token != expected {
            return Err("admin token rejected".to_string());
        }
        let email = EmailAddress::new(&request.email).map_err(err_string)?;
        let mut store = self.lock_store()?;
        let Some(user) = store.user_by_email(&email) else {
            return Err("no account for that email".to_string());
        };
        let user_id = user.user_id.clone();
        admin_unlock_voice(&mut store, &user_id).map_err(err_string)?;
        Ok(AdminUnlockAdapterResponse {
            status: "ok".to_string(),
            user_id: user_id.as_str().to_string(),
        })
    }

    // ---- tasks ----

    pub fn ingest_text(
        &self,
        request: IngestTextAdapterRequest,
    ) -> Result<TaskIngestAdapterResponse, String> {
        let mut store = self.lock_store()?;
        let user_id = authed_user(&store, &request.token)?;
        let outcome = self
            .task_flows
            .ingest_text(
                &mut store,
                &self.clock,
                &user_id,
                &request.text,
                &self.category,
                &self.priority,
            )
            .map_err(task_error_to_string)?;
        Ok(ingest_outcome_to_response(outcome))
    }

    pub fn ingest_voice(
        &self,
        request: IngestVoiceAdapterRequest,
    ) -> Result<TaskIngestAdapterResponse, String> {
        let sample = decode_sample(&request.audio_b64, request.duration_ms)?;
        let mut store = self.lock_store()?;
        let user_id = authed_user(&store, &request.token)?;
        let outcome = self
            .task_flows
            .ingest_voice(
                &mut store,
                &self.clock,
                &user_id,
                &sample,
                &*self.transcriber,
                &self.category,
                &self.priority,
            )
            .map_err(task_error_to_string)?;
        Ok(ingest_outcome_to_response(outcome))
    }

    pub fn set_due(&self, request: SetDueAdapterRequest) -> Result<SetDueAdapterResponse, String> {
        let task_id = TaskId::new(&request.task_id).map_err(err_string)?;
        let mut store = self.lock_store()?;
        let user_id = authed_user(&store, &request.token)?;
        let outcome = self
            .task_flows
            .set_due(&mut store, &self.clock, &user_id, &task_id, &request.due_local)
            .map_err(task_error_to_string)?;
        Ok(SetDueAdapterResponse {
            status: "ok".to_string(),
            due_at_utc: outcome.due_at_utc.to_rfc3339(),
            remind_at_utc: outcome.remind_at_utc.to_rfc3339(),
            reminder_id: outcome.reminder_id.as_str().to_string(),
            calendar_link: outcome.calendar_link,
        })
    }

    pub fn complete_task(
        &self,
        request: CompleteTaskAdapterRequest,
    ) -> Result<CompleteTaskAdapterResponse, String> {
        let task_id = TaskId::new(&request.task_id).map_err(err_string)?;
        let mut store = self.lock_store()?;
        let user_id = authed_user(&store, &request.token)?;
        let history_id = self
            .task_flows
            .complete(&mut store, &self.clock, &user_id, &task_id)
            .map_err(task_error_to_string)?;
        Ok(CompleteTaskAdapterResponse {
            status: "ok".to_string(),
            history_id: history_id.as_str().to_string(),
        })
    }

    pub fn list_tasks(
        &self,
        request: SessionAdapterRequest,
    ) -> Result<TaskListAdapterResponse, String> {
        let store = self.lock_store()?;
        let user_id = authed_user(&store, &request.token)?;
        let tasks = self
            .task_flows
            .list(&store, &user_id)
            .into_iter()
            .map(|task| TaskRowAdapter {
                task_id: task.task_id.as_str().to_string(),
                title: task.title.clone(),
                text: task.text.clone(),
                due_at_utc: task.due_at.map(|t| t.to_rfc3339()),
                category: task.category.as_str().to_string(),
                priority: task.priority.as_str().to_string(),
                status: format!("{:?}", task.status).to_ascii_lowercase(),
            })
            .collect();
        Ok(TaskListAdapterResponse {
            status: "ok".to_string(),
            tasks,
        })
    }

    // ---- history ----

    pub fn list_history(
        &self,
        request: SessionAdapterRequest,
    ) -> Result<HistoryListAdapterResponse, String> {
        let store = self.lock_store()?;
        let user_id = authed_user(&store, &request.token)?;
        let entries = history::list_history(&store, &user_id)
            .into_iter()
            .map(|row| HistoryRowAdapter {
                id: row.id,
                title: row.title,
                due_at_utc: row.due_at.map(|t| t.to_rfc3339()),
                category: row.category.as_str().to_string(),
                priority: row.priority.as_str().to_string(),
                source: match row.source {
                    HistorySource::Completed => "completed".to_string(),
                    HistorySource::Archived => "archived".to_string(),
                },
                completed_at_utc: row.completed_at.map(|t| t.to_rfc3339()),
            })
            .collect();
        Ok(HistoryListAdapterResponse {
            status: "ok".to_string(),
            entries,
        })
    }

    pub fn clear_history(
        &self,
        request: SessionAdapterRequest,
    ) -> Result<ClearHistoryAdapterResponse, String> {
        let mut store = self.lock_store()?;
        let user_id = authed_user(&store, &request.token)?;
        Ok(ClearHistoryAdapterResponse {
            status: "ok".to_string(),
            removed: history::clear_history(&mut store, &user_id),
        })
    }

    // ---- reminder worker ----

    pub fn scan_config(&self) -> ReminderScanConfig {
        self.scanner.config()
    }

    pub fn run_reminder_scan_pass(&self) -> Result<ScanWorkerCounters, String> {
        let report = {
            let mut store = self.lock_store()?;
            self.scanner
                .run_once(
                    &mut store,
                    &*self.mailer,
                    self.task_flows.scheduler(),
                    &self.clock,
                )
                .map_err(err_string)?
        };
        let now_unix = self.clock.now().0.timestamp();
        let mut counters = self
            .scan_counters
            .lock()
            .map_err(|_| "adapter scan counters lock poisoned".to_string())?;
        counters.pass_count = counters.pass_count.saturating_add(1);
        counters.due_seen_total = counters.due_seen_total.saturating_add(report.due_seen as u64);
        counters.delivered_total = counters
            .delivered_total
            .saturating_add(report.delivered as u64);
        counters.send_failed_total = counters
            .send_failed_total
            .saturating_add(report.send_failed as u64);
        counters.quarantined_total = counters
            .quarantined_total
            .saturating_add(report.quarantined as u64);
        counters.audit_failed_total = counters
            .audit_failed_total
            .saturating_add(report.audit_failed as u64);
        counters.last_pass_at_unix = Some(now_unix);
        counters.last_due_seen = report.due_seen;
        counters.last_delivered = report.delivered;
        counters.last_send_failed = report.send_failed;
        counters.last_quarantined = report.quarantined;
        counters.last_audit_failed = report.audit_failed;
        Ok(counters.clone())
    }

    pub fn health_report(&self) -> Result<AdapterHealthResponse, String> {
        let scan = self
            .scan_counters
            .lock()
            .map_err(|_| "adapter scan counters lock poisoned".to_string())?
            .clone();
        Ok(AdapterHealthResponse {
            status: "ok".to_string(),
            outcome: "HEALTHY".to_string(),
            reason: None,
            scan,
        })
    }

    fn lock_store(&self) -> Result<std::sync::MutexGuard<'_, NudgeStore>, String> {
        self.store
            .lock()
            .map_err(|_| "adapter store lock poisoned".to_string())
    }
}

fn authed_user(store: &NudgeStore, raw_token: &str) -> Result<UserId, String> {
    let token = SessionToken::new(raw_token).map_err(|_| "invalid session token".to_string())?;
    store
        .session(&token)
        .map(|session| session.user_id.clone())
        .ok_or_else(|| "invalid session token".to_string())
}

fn decode_optional_sample(
    audio_b64: Option<String>,
    duration_ms: Option<u32>,
) -> Result<Option<AudioSample>, String> {
    match (audio_b64, duration_ms) {
        (Some(audio), Some(duration)) => Ok(Some(decode_sample(&audio, duration)?)),
        (None, None) => Ok(None),
        _ => Err("voice_audio_b64 and voice_duration_ms must be supplied together".to_string()),
    }
}

fn decode_sample(audio_b64: &str, duration_ms: u32) -> Result<AudioSample, String> {
    let bytes = BASE64
        .decode(audio_b64.as_bytes())
        .map_err(|_| "audio_b64 is not valid base64".to_string())?;
    AudioSample::v1(bytes, duration_ms).map_err(err_string)
}

fn login_outcome_to_response(outcome: LoginOutcome) -> LoginAdapterResponse {
    let mut response = LoginAdapterResponse {
        status: "ok".to_string(),
        outcome: String::new(),
        token: None,
        user_id: None,
        score: None,
        voice_enrolled: None,
        security_question: None,
        reason: None,
    };
    match outcome {
        LoginOutcome::Session {
            token,
            user_id,
            score,
            voice_enrolled,
        } => {
            response.outcome = "SESSION".to_string();
            response.token = Some(token.as_str().to_string());
            response.user_id = Some(user_id.as_str().to_string());
            response.score = score;
            response.voice_enrolled = Some(voice_enrolled);
        }
        LoginOutcome::Challenge { question } => {
            response.outcome = "CHALLENGE".to_string();
            response.security_question = Some(question.as_str().to_string());
        }
        LoginOutcome::RejectedInvalid { message } => {
            response.outcome = "REJECTED_INVALID".to_string();
            response.reason = Some(message.to_string());
        }
        LoginOutcome::RejectedLocked { message } => {
            response.outcome = "REJECTED_LOCKED".to_string();
            response.reason = Some(message.to_string());
        }
    }
    response
}

fn ingest_outcome_to_response(
    outcome: voicenudge_os::tasks::TaskIngestOutcome,
) -> TaskIngestAdapterResponse {
    TaskIngestAdapterResponse {
        status: "ok".to_string(),
        task_id: outcome.task_id.as_str().to_string(),
        title: outcome.title,
        due_at_utc: outcome.due_at.map(|t| t.to_rfc3339()),
        category: outcome.category.as_str().to_string(),
        priority: outcome.priority.as_str().to_string(),
        needs_due_date: outcome.needs_due_date,
        transcribed_text: outcome.transcribed_text,
        original_text: outcome.original_text,
    }
}

fn resolve_provider_secret(id: ProviderSecretId, env_override: &str) -> Option<String> {
    if let Ok(value) = env::var(env_override) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    match secret_vault::resolve_secret(id) {
        Ok(found) => found,
        Err(err) => {
            eprintln!("voicenudge_adapter: vault lookup for {} failed: {err}", id.as_str());
            None
        }
    }
}

fn register_error_to_string(err: RegisterError) -> String {
    match err {
        RegisterError::EmailTaken => "an account with that email already exists".to_string(),
        other => err_string(other),
    }
}

fn task_error_to_string(err: TaskFlowError) -> String {
    match err {
        TaskFlowError::EmptyText => "task text is empty".to_string(),
        other => err_string(other),
    }
}

fn err_string(err: impl std::fmt::Debug) -> String {
    format!("{err:?}")
}
