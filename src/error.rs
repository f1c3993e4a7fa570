//! Terminal rejections produced by the gates.
//!
//! Every gate resolves its own failure class into one of these and writes
//! it as the response; nothing propagates past the gate that raised it.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Why a request was turned away.
#[derive(Debug, Error)]
pub enum GateRejection {
    /// Rate window exhausted; the caller may retry after the window resets.
    #[error("rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Caller is temporarily banned.
    #[error("temporarily banned")]
    Jailed,

    /// The counter store could not be consulted. Requests fail closed.
    #[error("admission system unavailable")]
    StoreUnavailable(#[from] StoreError),

    /// Missing or rejected bearer credential.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Downstream kept failing after the retry budget was spent.
    #[error("downstream failure")]
    DownstreamFailure,

    /// Request body too large to buffer for replay.
    #[error("request body too large")]
    PayloadTooLarge,
}

impl GateRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GateRejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateRejection::Jailed => StatusCode::FORBIDDEN,
            GateRejection::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateRejection::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GateRejection::DownstreamFailure => StatusCode::INTERNAL_SERVER_ERROR,
            GateRejection::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Machine-readable kind used in the JSON body and in metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            GateRejection::RateLimited { .. } => "rate_limited",
            GateRejection::Jailed => "jailed",
            GateRejection::StoreUnavailable(_) => "store_unavailable",
            GateRejection::Unauthenticated(_) => "unauthenticated",
            GateRejection::DownstreamFailure => "downstream_failure",
            GateRejection::PayloadTooLarge => "payload_too_large",
        }
    }

    fn message(&self) -> String {
        match self {
            // Store details stay in the logs.
            GateRejection::StoreUnavailable(_) => "admission system unavailable".to_string(),
            GateRejection::Jailed => "temporarily banned, try again later".to_string(),
            GateRejection::DownstreamFailure => "service temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind(),
            "message": self.message(),
        }));
        let mut response = (self.status(), body).into_response();

        if let GateRejection::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
