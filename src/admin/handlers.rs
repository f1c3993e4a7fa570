use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::error::GateRejection;
use crate::security::ClientState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub capacity: u64,
    pub window_secs: u64,
    pub failure_threshold: u64,
    pub jail_secs: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let policy = state.gate.policy();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        capacity: policy.capacity,
        window_secs: policy.window.as_secs(),
        failure_threshold: policy.failure_threshold,
        jail_secs: policy.jail_duration.as_secs(),
    })
}

pub async fn get_client(
    State(state): State<AdminState>,
    Path(client): Path<String>,
) -> Result<Json<ClientState>, GateRejection> {
    Ok(Json(state.gate.client_state(&client).await?))
}

pub async fn release_client(
    State(state): State<AdminState>,
    Path(client): Path<String>,
) -> Result<StatusCode, GateRejection> {
    state.gate.release(&client).await?;
    Ok(StatusCode::NO_CONTENT)
}
