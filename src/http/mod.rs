//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span, timeout)
//!     → chain.rs (admission → retry → auth, per route group)
//!     → handler
//!     → Send to client
//! ```

pub mod chain;
pub mod request;
pub mod server;

pub use chain::GateChain;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
