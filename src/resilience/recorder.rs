//! Buffered capture of one downstream attempt.
//!
//! The retry wrapper never hands a failed downstream response to the client
//! while it might still retry. Each failed attempt is drained here in full
//! (status, headers, body) and dropped. A recorder can still be released as
//! a response when a caller wants to keep one.

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{response::Parts, StatusCode},
    response::Response,
};

/// A fully buffered response.
#[derive(Debug)]
pub struct ResponseRecorder {
    parts: Parts,
    body: Bytes,
}

impl ResponseRecorder {
    /// Drain `response`, buffering at most `limit` body bytes.
    pub async fn capture(response: Response, limit: usize) -> Result<Self, axum::Error> {
        let (parts, body) = response.into_parts();
        let body = to_bytes(body, limit).await?;
        Ok(Self { parts, body })
    }

    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    pub fn is_server_error(&self) -> bool {
        self.parts.status.is_server_error()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Release the buffered response to the caller.
    pub fn into_response(self) -> Response {
        Response::from_parts(self.parts, Body::from(self.body))
    }
}
