//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (who is calling)
//!     → admission.rs (jail check, rate window, escalation)
//!     → [retry wrapper]
//!     → auth.rs (bearer credential via verifier.rs)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Defense in depth: admission runs before authentication, so
//!   unauthenticated abuse still spends the caller's budget
//! - Fail closed: reject when the counter store is unreachable
//! - No trust in client input (X-Forwarded-For only when configured)

pub mod admission;
pub mod auth;
pub mod identity;
pub mod verifier;

pub use admission::{admission_middleware, AdmissionGate, AdmissionPolicy, AdmissionState, ClientState};
pub use auth::{auth_middleware, AuthGate};
pub use verifier::{verifier_from_config, Hs256Verifier, StaticTokenVerifier, TokenVerifier, VerifyError};
