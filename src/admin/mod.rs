//! Admin API.
//!
//! Served on its own listener, guarded by a bearer API key:
//! - `GET /admin/status`
//! - `GET /admin/clients/{client}`
//! - `DELETE /admin/clients/{client}/jail`

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};
use tokio::net::TcpListener;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::lifecycle::shutdown;
use crate::security::AdmissionGate;

#[derive(Debug, Clone)]
pub struct AdminState {
    pub gate: AdmissionGate,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/clients/{client}", get(get_client))
        .route("/admin/clients/{client}/jail", delete(release_client))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: tokio::sync::broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown::wait(shutdown))
        .await
}
