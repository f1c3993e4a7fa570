//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted by the admission gate:
//!     → retries.rs (buffer request, invoke inner chain, retry on 5xx)
//!     → recorder.rs (capture each attempt, release only the final one)
//! ```
//!
//! # Design Decisions
//! - Every attempt is fully buffered; the client only ever sees one response
//! - Retry budget is per request and bounded
//! - Request timeouts (tower-http) cancel the whole retry loop

pub mod recorder;
pub mod retries;

pub use recorder::ResponseRecorder;
pub use retries::{retry_middleware, RetryPolicy};
