//! Auth gate middleware.
//! Requires a valid bearer credential before the request may continue.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GateRejection;
use crate::observability::metrics;
use crate::security::verifier::TokenVerifier;

/// State required for the auth gate.
#[derive(Debug, Clone)]
pub struct AuthGate {
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AuthGate {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

/// Extract the credential from an `Authorization: Bearer <token>` value.
/// The scheme name is matched case-insensitively.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn auth_middleware(
    State(gate): State<AuthGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        metrics::record_auth_rejection("missing");
        return GateRejection::Unauthenticated("missing credentials").into_response();
    };

    let Some(token) = value.to_str().ok().and_then(bearer_token) else {
        metrics::record_auth_rejection("malformed");
        return GateRejection::Unauthenticated("invalid token").into_response();
    };

    match gate.verifier.validate(token) {
        Ok(_) => next.run(request).await,
        Err(e) => {
            tracing::debug!(reason = %e, "Bearer token rejected");
            metrics::record_auth_rejection("invalid");
            GateRejection::Unauthenticated("invalid token").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::verifier::StaticTokenVerifier;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    fn app(hits: Arc<AtomicUsize>) -> Router {
        let gate = AuthGate::new(Arc::new(StaticTokenVerifier::new(["good"])));
        Router::new()
            .route(
                "/",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        "inner"
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(gate, auth_middleware))
    }

    async fn call(app: Router, authorization: Option<&str>) -> StatusCode {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = authorization {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_invalid_token_never_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        assert_eq!(call(app(hits.clone()), Some("Bearer wrong")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(call(app(hits.clone()), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(call(app(hits.clone()), Some("Token good")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_token_passes_through() {
        let hits = Arc::new(AtomicUsize::new(0));
        assert_eq!(call(app(hits.clone()), Some("Bearer good")).await, StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
