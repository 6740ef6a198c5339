#![forbid(unsafe_code)]

use std::{
    env,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use voicenudge_adapter::{
    AdapterHealthResponse, AdapterRuntime, AdminUnlockAdapterRequest, IngestTextAdapterRequest,
    IngestVoiceAdapterRequest, LoginAdapterRequest, RegisterAdapterRequest,
    ScanWorkerCounters, SecurityQuestionAdapterRequest, SessionAdapterRequest,
    SetDueAdapterRequest, CompleteTaskAdapterRequest, VerifySecurityAdapterRequest,
};
use voicenudge_os::reminder_scan::should_run_after_delay;

type SharedRuntime = Arc<Mutex<AdapterRuntime>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bind = env::var("VOICENUDGE_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;
    let scan_worker_enabled = parse_scan_worker_enabled_from_env();

    let runtime = Arc::new(Mutex::new(AdapterRuntime::default_from_env()?));
    let scan_config = runtime
        .lock()
        .map_err(|_| "adapter runtime lock poisoned")?
        .scan_config();
    if scan_worker_enabled {
        let runtime_for_worker = runtime.clone();
        tokio::spawn(async move {
            let period = Duration::from_millis(scan_config.scan_interval_ms);
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            let mut expected = Instant::now() + period;
            loop {
                ticker.tick().await;
                let lateness = Instant::now().saturating_duration_since(expected);
                expected += period;
                if !should_run_after_delay(lateness.as_millis() as u64, &scan_config) {
                    eprintln!(
                        "voicenudge_adapter_http scan tick skipped, {}ms past its schedule",
                        lateness.as_millis()
                    );
                    continue;
                }
                let pass_result = match runtime_for_worker.lock() {
                    Ok(runtime) => runtime.run_reminder_scan_pass(),
                    Err(_) => Err("adapter runtime lock poisoned".to_string()),
                };
                match pass_result {
                    Ok(counters) => {
                        if counters.last_due_seen > 0 {
                            println!(
                                "voicenudge_adapter_http scan pass: due={} delivered={} failed={} quarantined={}",
                                counters.last_due_seen,
                                counters.last_delivered,
                                counters.last_send_failed,
                                counters.last_quarantined
                            );
                        }
                    }
                    Err(err) => eprintln!("voicenudge_adapter_http scan pass failed: {err}"),
                }
            }
        });
    }

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/auth/register", post(auth_register))
        .route("/v1/auth/login", post(auth_login))
        .route("/v1/auth/security_question", post(auth_security_question))
        .route("/v1/auth/verify_security", post(auth_verify_security))
        .route("/v1/auth/me", post(auth_me))
        .route("/v1/auth/logout", post(auth_logout))
        .route("/v1/tasks/ingest_text", post(tasks_ingest_text))
        .route("/v1/tasks/ingest_voice", post(tasks_ingest_voice))
        .route("/v1/tasks/set_due", post(tasks_set_due))
        .route("/v1/tasks/complete", post(tasks_complete))
        .route("/v1/tasks/list", post(tasks_list))
        .route("/v1/history/list", post(history_list))
        .route("/v1/history/clear", post(history_clear))
        .route("/v1/admin/unlock", post(admin_unlock))
        .with_state(runtime);

    println!(
        "voicenudge_adapter_http listening on http://{addr} (scan_worker_enabled={scan_worker_enabled} interval_ms={})",
        scan_config.scan_interval_ms
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn parse_scan_worker_enabled_from_env() -> bool {
    match env::var("VOICENUDGE_SCAN_WORKER_ENABLED") {
        Ok(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        Err(_) => true,
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    status: &'static str,
    reason: String,
}

fn error_response(code: StatusCode, reason: String) -> Response {
    (
        code,
        Json(ErrorBody {
            status: "error",
            reason,
        }),
    )
        .into_response()
}

fn lock_failure() -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "adapter runtime lock poisoned".to_string(),
    )
}

fn login_status(outcome: &str) -> StatusCode {
    match outcome {
        "SESSION" => StatusCode::OK,
        "CHALLENGE" => StatusCode::PARTIAL_CONTENT,
        "REJECTED_LOCKED" => StatusCode::FORBIDDEN,
        _ => StatusCode::UNAUTHORIZED,
    }
}

macro_rules! plain_handler {
    ($name:ident, $request:ty, $method:ident) => {
        async fn $name(State(runtime): State<SharedRuntime>, Json(request): Json<$request>) -> Response {
            let runtime = match runtime.lock() {
                Ok(runtime) => runtime,
                Err(_) => return lock_failure(),
            };
            match runtime.$method(request) {
                Ok(response) => (StatusCode::OK, Json(response)).into_response(),
                Err(reason) => error_response(StatusCode::BAD_REQUEST, reason),
            }
        }
    };
}

plain_handler!(auth_register, RegisterAdapterRequest, register);
plain_handler!(auth_security_question, SecurityQuestionAdapterRequest, security_question);
plain_handler!(auth_me, SessionAdapterRequest, me);
plain_handler!(auth_logout, SessionAdapterRequest, logout);
plain_handler!(tasks_ingest_text, IngestTextAdapterRequest, ingest_text);
plain_handler!(tasks_ingest_voice, IngestVoiceAdapterRequest, ingest_voice);
plain_handler!(tasks_set_due, SetDueAdapterRequest, set_due);
plain_handler!(tasks_complete, CompleteTaskAdapterRequest, complete_task);
plain_handler!(tasks_list, SessionAdapterRequest, list_tasks);
plain_handler!(history_list, SessionAdapterRequest, list_history);
plain_handler!(history_clear, SessionAdapterRequest, clear_history);

async fn auth_login(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<LoginAdapterRequest>,
) -> Response {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_failure(),
    };
    match runtime.login(request) {
        Ok(response) => (login_status(&response.outcome), Json(response)).into_response(),
        Err(reason) => error_response(StatusCode::BAD_REQUEST, reason),
    }
}

async fn auth_verify_security(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<VerifySecurityAdapterRequest>,
) -> Response {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_failure(),
    };
    match runtime.verify_security(request) {
        Ok(response) => (login_status(&response.outcome), Json(response)).into_response(),
        Err(reason) => error_response(StatusCode::BAD_REQUEST, reason),
    }
}

async fn admin_unlock(
    State(runtime): State<SharedRuntime>,
    Json(request): Json<AdminUnlockAdapterRequest>,
) -> Response {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => return lock_failure(),
    };
    match runtime.admin_unlock(request) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(reason) => error_response(StatusCode::FORBIDDEN, reason),
    }
}

async fn healthz(State(runtime): State<SharedRuntime>) -> (StatusCode, Json<AdapterHealthResponse>) {
    let runtime = match runtime.lock() {
        Ok(runtime) => runtime,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AdapterHealthResponse {
                    status: "error".to_string(),
                    outcome: "UNHEALTHY".to_string(),
                    reason: Some("adapter runtime lock poisoned".to_string()),
                    scan: ScanWorkerCounters::default(),
                }),
            );
        }
    };
    match runtime.health_report() {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(reason) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(AdapterHealthResponse {
                status: "error".to_string(),
                outcome: "UNHEALTHY".to_string(),
                reason: Some(reason),
                scan: ScanWorkerCounters::default(),
            }),
        ),
    }
}
