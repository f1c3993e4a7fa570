//! Request-admission gateway library.
//!
//! Admission gate, retry wrapper and auth gate as composable axum
//! middleware, backed by a shared counter store.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::schema::GatewayConfig;
pub use error::GateRejection;
pub use http::{GateChain, HttpServer};
pub use lifecycle::Shutdown;
pub use store::CounterStore;
