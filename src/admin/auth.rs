use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::admin::AdminState;
use crate::security::auth::bearer_token;

/// Require `Authorization: Bearer <admin api key>`.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token);

    if let Some(key) = presented {
        if !state.api_key.is_empty() && bool::from(key.as_bytes().ct_eq(state.api_key.as_bytes())) {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!("Rejected admin request with bad API key");
    Err(StatusCode::UNAUTHORIZED)
}
