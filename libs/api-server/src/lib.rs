use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use job_registry::{Registry, RegistryError};
use jobs_api::Record;

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
}

/// `{"success": bool}`, the only body mutating endpoints return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Routes of the admin API, without a listener.
pub fn router(registry: Arc<Registry>) -> Router {
    let state = AppState { registry };

    Router::new()
        .route("/api/jobs", get(handle_list_jobs))
        .route("/api/job", post(handle_save_job).put(handle_save_job))
        .route("/api/job/{job_id}/{source}", delete(handle_delete_job))
        .route("/api/job/toggle/{job_id}/{source}", post(handle_toggle_job))
        .route("/api/jobs/toggle-all", post(handle_toggle_all))
        .with_state(state)
}

/// Job admin HTTP API server. Runs until `shutdown` is cancelled.
pub async fn run(
    bind: &str,
    port: u16,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(registry);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .map_err(|e| format!("bind api {bind}:{port}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

/// Registry calls do blocking file I/O; keep them off the async workers.
async fn blocking<T, F>(state: &AppState, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce(&Registry) -> T + Send + 'static,
{
    let registry = state.registry.clone();
    match tokio::task::spawn_blocking(move || f(&registry)).await {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::error!(error = %e, "registry task failed");
            None
        }
    }
}

/// Collapse an operation result into `{"success": bool}`, logging the cause.
fn respond<T>(op: &'static str, result: Option<Result<T, RegistryError>>) -> Json<SuccessResponse> {
    let success = match result {
        Some(Ok(_)) => true,
        Some(Err(e)) => {
            tracing::error!(op, error = %e, "request failed");
            false
        }
        None => false,
    };
    Json(SuccessResponse { success })
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ActiveBody {
    #[serde(default = "default_active")]
    active: bool,
}

/// Empty body means `active: true`.
fn parse_active(body: &[u8]) -> Result<bool, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(default_active());
    }
    serde_json::from_slice::<ActiveBody>(body).map(|b| b.active)
}

// --- REST: GET /api/jobs ---

async fn handle_list_jobs(State(state): State<AppState>) -> Json<Vec<Record>> {
    let jobs = blocking(&state, |registry| registry.load_all()).await;
    Json(jobs.unwrap_or_default())
}

// --- REST: POST|PUT /api/job ---

async fn handle_save_job(State(state): State<AppState>, body: Bytes) -> Json<SuccessResponse> {
    let record = match serde_json::from_slice::<serde_json::Value>(&body)
        .map_err(|e| e.to_string())
        .and_then(|v| Record::try_from(v).map_err(|e| e.to_string()))
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "rejected job body");
            return Json(SuccessResponse { success: false });
        }
    };

    let result = blocking(&state, move |registry| registry.upsert(&record)).await;
    respond("save", result)
}

// --- REST: DELETE /api/job/{job_id}/{source} ---

async fn handle_delete_job(
    State(state): State<AppState>,
    Path((job_id, source)): Path<(String, String)>,
) -> Json<SuccessResponse> {
    let result = blocking(&state, move |registry| registry.delete(&job_id, &source)).await;
    respond("delete", result)
}

// --- REST: POST /api/job/toggle/{job_id}/{source} ---

async fn handle_toggle_job(
    State(state): State<AppState>,
    Path((job_id, source)): Path<(String, String)>,
    body: Bytes,
) -> Json<SuccessResponse> {
    let active = match parse_active(&body) {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(error = %e, "rejected toggle body");
            return Json(SuccessResponse { success: false });
        }
    };
    let result = blocking(&state, move |registry| registry.toggle_one(&job_id, &source, active)).await;
    respond("toggle", result)
}

// --- REST: POST /api/jobs/toggle-all ---

async fn handle_toggle_all(State(state): State<AppState>, body: Bytes) -> Json<SuccessResponse> {
    let active = match parse_active(&body) {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!(error = %e, "rejected toggle-all body");
            return Json(SuccessResponse { success: false });
        }
    };
    let result = blocking(&state, move |registry| registry.toggle_all(active)).await;
    respond("toggle_all", result)
}
