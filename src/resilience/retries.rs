//! Retry wrapper.
//!
//! # Responsibilities
//! - Replay the inner chain when it answers with a 5xx status
//! - Wait a fixed delay between attempts
//! - Answer with one uniform 500 once the retry budget is spent
//!
//! # Design Decisions
//! - Request body is buffered once so every attempt sees the same request
//! - The first non-5xx response is returned as-is and ends the loop
//! - Failed attempts are drained into a `ResponseRecorder` and dropped, so
//!   their bodies never reach the client
//! - No jitter, no circuit breaking: at most `max_retries + 1` invocations
//! - Cancellation is by drop: if the connection goes away mid-delay the
//!   loop future is dropped and no further attempt runs

use std::future::Future;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::RetryConfig;
use crate::error::GateRejection;
use crate::observability::metrics;
use crate::resilience::recorder::ResponseRecorder;

/// Retry count, delay and buffering bound for the retry wrapper.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
    max_buffered_bytes: usize,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            max_buffered_bytes: RetryConfig::default().max_buffered_body_bytes,
        }
    }

    /// Bound for both the buffered request body and each captured response.
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.max_buffered_bytes = bytes;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `attempt` until it answers with a non-5xx status or the budget
    /// runs out.
    pub async fn run<F, Fut>(&self, request: Request<Body>, mut attempt: F) -> Response
    where
        F: FnMut(Request<Body>) -> Fut,
        Fut: Future<Output = Response>,
    {
        let (parts, body) = request.into_parts();
        let body = match to_bytes(body, self.max_buffered_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, limit = self.max_buffered_bytes, "Request body could not be buffered for retry");
                return GateRejection::PayloadTooLarge.into_response();
            }
        };

        let attempts = self.max_retries + 1;
        for n in 1..=attempts {
            let request = Request::from_parts(parts.clone(), Body::from(body.clone()));
            let response = attempt(request).await;

            // A non-5xx answer is final, so it streams through untouched.
            if !response.status().is_server_error() {
                if n > 1 {
                    tracing::info!(attempt = n, status = %response.status(), "Request succeeded after retry");
                }
                return response;
            }

            match ResponseRecorder::capture(response, self.max_buffered_bytes).await {
                Ok(recorded) => {
                    tracing::debug!(attempt = n, status = %recorded.status(), body_len = recorded.body().len(), "Downstream attempt failed");
                }
                Err(e) => {
                    tracing::warn!(attempt = n, error = %e, "Failed downstream response could not be drained");
                }
            }

            if n < attempts {
                metrics::record_retry();
                tracing::info!(attempt = n, delay = ?self.delay, "Retrying request");
                tokio::time::sleep(self.delay).await;
            }
        }

        metrics::record_retry_exhausted();
        tracing::warn!(attempts, "Retry budget exhausted");
        GateRejection::DownstreamFailure.into_response()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.delay()).with_body_limit(config.max_buffered_body_bytes)
    }
}

/// Middleware function for the retry wrapper.
pub async fn retry_middleware(
    State(policy): State<RetryPolicy>,
    request: Request<Body>,
    next: Next,
) -> Response {
    policy.run(request, move |req| next.clone().run(req)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    fn get() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Handler failing `failures` times with a distinctive body, then succeeding.
    fn flaky(
        failures: u32,
        calls: Arc<AtomicU32>,
    ) -> impl FnMut(Request<Body>) -> std::pin::Pin<Box<dyn Future<Output = Response> + Send>> {
        move |_req| {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("partial failure {n}")).into_response()
                } else {
                    (StatusCode::OK, "ok").into_response()
                }
            })
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_kth_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(5));

        let response = policy.run(get(), flaky(2, calls.clone())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Earlier failed bodies never reach the caller.
        assert_eq!(body_text(response).await, "ok");
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_uniform_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(20));

        let start = Instant::now();
        let response = policy.run(get(), flaky(u32::MAX, calls.clone())).await;

        assert!(start.elapsed() >= Duration::from_millis(60));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let text = body_text(response).await;
        assert!(text.contains("downstream_failure"));
        assert!(!text.contains("partial failure"));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(5));
        let c = calls.clone();

        let response = policy
            .run(get(), move |_req| {
                c.fetch_add(1, Ordering::SeqCst);
                async { StatusCode::NOT_FOUND.into_response() }
            })
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(0, Duration::from_secs(10));

        let response = policy.run(get(), flaky(1, calls.clone())).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_attempt_sees_the_same_body() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let s = seen.clone();

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("payload"))
            .unwrap();

        let response = policy
            .run(request, move |req: Request<Body>| {
                let s = s.clone();
                async move {
                    let body = to_bytes(req.into_body(), 1024).await.unwrap();
                    let mut seen = s.lock().unwrap();
                    seen.push(body);
                    if seen.len() < 3 {
                        StatusCode::BAD_GATEWAY.into_response()
                    } else {
                        StatusCode::OK.into_response()
                    }
                }
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|b| b.as_ref() == b"payload"));
    }

    #[tokio::test]
    async fn test_oversized_request_body_is_rejected_before_any_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(1, Duration::from_millis(1)).with_body_limit(4);
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from("too large"))
            .unwrap();

        let response = policy.run(request, flaky(0, calls.clone())).await;

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_large_successful_response_is_not_replayed() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, Duration::from_millis(1)).with_body_limit(16);
        let c = calls.clone();

        let response = policy
            .run(get(), move |_req| {
                c.fetch_add(1, Ordering::SeqCst);
                async { (StatusCode::OK, "x".repeat(64)).into_response() }
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(body_text(response).await, "x".repeat(64));
    }

    #[tokio::test]
    async fn test_dropping_the_request_stops_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(5, Duration::from_millis(200));

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            policy.run(get(), flaky(u32::MAX, calls.clone())),
        )
        .await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
