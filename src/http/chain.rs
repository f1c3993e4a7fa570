//! Gate chain composition.
//!
//! ```text
//! request → Admission Gate → Retry Wrapper → Auth Gate → handler
//! ```
//!
//! Axum runs the last added layer first, so `apply` adds them in reverse.
//! Any gate can be left out; the order of the rest is fixed.

use axum::{middleware, Router};

use crate::resilience::{retry_middleware, RetryPolicy};
use crate::security::{admission_middleware, auth_middleware, AdmissionState, AuthGate};

/// Which gates wrap a route group.
#[derive(Debug, Clone, Default)]
pub struct GateChain {
    admission: Option<AdmissionState>,
    retry: Option<RetryPolicy>,
    auth: Option<AuthGate>,
}

impl GateChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_admission(mut self, state: AdmissionState) -> Self {
        self.admission = Some(state);
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn with_auth(mut self, gate: AuthGate) -> Self {
        self.auth = Some(gate);
        self
    }

    /// Wrap every route in `router` with the configured gates.
    pub fn apply<S>(&self, mut router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        if let Some(gate) = &self.auth {
            router = router.layer(middleware::from_fn_with_state(gate.clone(), auth_middleware));
        }
        if let Some(policy) = &self.retry {
            router = router.layer(middleware::from_fn_with_state(policy.clone(), retry_middleware));
        }
        if let Some(state) = &self.admission {
            router = router.layer(middleware::from_fn_with_state(
                state.clone(),
                admission_middleware,
            ));
        }
        router
    }
}
