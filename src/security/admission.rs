//! Admission gate: per-client rate window with abuse escalation.
//!
//! # Algorithm
//! ```text
//! jail:<client> present?          → Jailed (403), nothing mutated
//! INCR ratelimit:<client>         (expiry = window, set on creation)
//!   count <= capacity             → admit, DEL failcount:<client>
//!   count >  capacity             → INCR failcount:<client> (expiry = failure window)
//!     failures > threshold        → SET jail:<client> (expiry = jail), Jailed (403)
//!     otherwise                   → RateLimited (429, Retry-After)
//! ```
//!
//! Any store error rejects the request; the gate never fails open.
//! The jail check and the window increment are separate single-key
//! operations, so a request racing a concurrent ban may still be counted.
//! The following request sees the ban.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::config::AdmissionConfig;
use crate::error::GateRejection;
use crate::observability::metrics;
use crate::security::identity::client_identity;
use crate::store::{CounterStore, KeySpace, StoreError};

/// Sentinel stored under `jail:<client>`.
const JAILED: i64 = 1;

/// Window, escalation and ban parameters.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    pub window: Duration,
    pub capacity: u64,
    pub failure_window: Duration,
    pub failure_threshold: u64,
    pub jail_duration: Duration,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self::from(&AdmissionConfig::default())
    }
}

impl From<&AdmissionConfig> for AdmissionPolicy {
    fn from(config: &AdmissionConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            capacity: config.capacity,
            failure_window: Duration::from_secs(config.failure_window_secs),
            failure_threshold: config.failure_threshold,
            jail_duration: Duration::from_secs(config.jail_secs),
        }
    }
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admitted {
    /// Requests left in the current window.
    pub remaining: u64,
}

/// Snapshot of the store state for one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientState {
    pub client: String,
    pub jailed: bool,
    pub jail_remaining_secs: Option<u64>,
    pub failures: u64,
    pub window_count: u64,
    pub window_remaining_secs: Option<u64>,
}

/// Decides admit / rate-limit / ban for each client.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    store: Arc<dyn CounterStore>,
    policy: AdmissionPolicy,
    keys: KeySpace,
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn as_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl AdmissionGate {
    pub fn new(store: Arc<dyn CounterStore>, policy: AdmissionPolicy) -> Self {
        Self {
            store,
            policy,
            keys: KeySpace::default(),
        }
    }

    /// Namespace every key with `keys`.
    pub fn with_keys(mut self, keys: KeySpace) -> Self {
        self.keys = keys;
        self
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Evaluate one request from `client`.
    pub async fn check(&self, client: &str) -> Result<Admitted, GateRejection> {
        let result = self.evaluate(client).await;
        match &result {
            Ok(_) => metrics::record_admission("admitted"),
            Err(GateRejection::RateLimited { retry_after_secs }) => {
                tracing::warn!(client = %client, retry_after_secs, "Rate limit exceeded");
                metrics::record_admission("rate_limited");
            }
            Err(GateRejection::Jailed) => {
                tracing::debug!(client = %client, "Rejected jailed client");
                metrics::record_admission("jailed");
            }
            Err(GateRejection::StoreUnavailable(e)) => {
                tracing::error!(client = %client, error = %e, "Counter store unavailable, rejecting");
                metrics::record_store_error();
                metrics::record_admission("store_unavailable");
            }
            Err(
                other @ (GateRejection::Unauthenticated(_)
                | GateRejection::DownstreamFailure
                | GateRejection::PayloadTooLarge),
            ) => {
                tracing::error!(client = %client, kind = other.kind(), "Unexpected admission outcome");
                metrics::record_admission(other.kind());
            }
        }
        result
    }

    async fn evaluate(&self, client: &str) -> Result<Admitted, GateRejection> {
        let jail_key = self.keys.jail(client);
        if self.store.get(&jail_key).await?.is_some() {
            return Err(GateRejection::Jailed);
        }

        let window_key = self.keys.rate_window(client);
        let failures_key = self.keys.failures(client);

        let count = as_count(
            self.store
                .increment_with_expiry(&window_key, self.policy.window)
                .await?,
        );
        if count <= self.policy.capacity {
            self.store.delete(&failures_key).await?;
            return Ok(Admitted {
                remaining: self.policy.capacity - count,
            });
        }

        let retry_after_secs = self.retry_after_secs(&window_key).await?;
        let failures = as_count(
            self.store
                .increment_with_expiry(&failures_key, self.policy.failure_window)
                .await?,
        );

        if failures > self.policy.failure_threshold {
            self.store
                .set_with_expiry(&jail_key, JAILED, self.policy.jail_duration)
                .await?;
            tracing::warn!(
                client = %client,
                failures,
                jail_secs = self.policy.jail_duration.as_secs(),
                "Client jailed after repeated rate limit violations"
            );
            return Err(GateRejection::Jailed);
        }

        Err(GateRejection::RateLimited { retry_after_secs })
    }

    /// Whole seconds until the window resets, within `1..=window`.
    async fn retry_after_secs(&self, window_key: &str) -> Result<u64, StoreError> {
        let window = ceil_secs(self.policy.window).max(1);
        let remaining = self.store.ttl(window_key).await?;
        Ok(remaining.map(ceil_secs).unwrap_or(window).clamp(1, window))
    }

    /// Read the counters and ban flag held for `client`.
    pub async fn client_state(&self, client: &str) -> Result<ClientState, StoreError> {
        let jail_key = self.keys.jail(client);
        let window_key = self.keys.rate_window(client);

        let jailed = self.store.get(&jail_key).await?.is_some();
        let jail_remaining_secs = if jailed {
            self.store.ttl(&jail_key).await?.map(ceil_secs)
        } else {
            None
        };
        let failures = self
            .store
            .get(&self.keys.failures(client))
            .await?
            .map_or(0, as_count);
        let window_count = self.store.get(&window_key).await?.map_or(0, as_count);
        let window_remaining_secs = self.store.ttl(&window_key).await?.map(ceil_secs);

        Ok(ClientState {
            client: client.to_string(),
            jailed,
            jail_remaining_secs,
            failures,
            window_count,
            window_remaining_secs,
        })
    }

    /// Lift a ban early and forget the failure history.
    pub async fn release(&self, client: &str) -> Result<(), StoreError> {
        self.store.delete(&self.keys.jail(client)).await?;
        self.store.delete(&self.keys.failures(client)).await?;
        tracing::info!(client = %client, "Client released");
        Ok(())
    }
}

/// State for the admission middleware.
#[derive(Debug, Clone)]
pub struct AdmissionState {
    pub gate: AdmissionGate,
    pub trust_forwarded_for: bool,
}

/// Middleware function for the admission gate.
pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_identity(&request, state.trust_forwarded_for);

    match state.gate.check(&client).await {
        Ok(_) => next.run(request).await,
        Err(rejection) => rejection.into_response(),
    }
}
