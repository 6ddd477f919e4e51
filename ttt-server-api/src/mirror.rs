use axum::{Json, extract::State};
use serde::Serialize;
use ttt_server_domain::app::AppState;

#[derive(Serialize)]
pub struct MirrorStatusResponse {
    enabled: bool,
    pending: usize,
    pushed: u64,
    failed: u64,
    last_success: Option<String>,
    last_error: Option<String>,
}

pub async fn get_status(State(app): State<AppState>) -> Json<MirrorStatusResponse> {
    let status = app.document_mirror.status();
    Json(MirrorStatusResponse {
        enabled: status.enabled,
        pending: status.pending,
        pushed: status.pushed,
        failed: status.failed,
        last_success: status.last_success.map(|t| t.to_rfc3339()),
        last_error: status.last_error,
    })
}
