//! Client identity extraction.
//!
//! The admission gate keys all of its state by this identity. By default it
//! is the peer IP of the connection. Behind a trusted reverse proxy the
//! first `X-Forwarded-For` entry can be used instead.

use std::net::{IpAddr, SocketAddr};

use axum::{extract::ConnectInfo, http::Request};

/// Identity used when neither the connection nor headers name the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the identity of the caller of `req`.
pub fn client_identity<B>(req: &Request<B>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_for(req) {
            return ip.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_for<B>(req: &Request<B>) -> Option<IpAddr> {
    req.headers()
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(peer: Option<&str>, xff: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = xff {
            builder = builder.header("x-forwarded-for", v);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(p) = peer {
            let addr: SocketAddr = p.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn test_peer_address_ignores_port() {
        let req = request(Some("192.0.2.7:51234"), None);
        assert_eq!(client_identity(&req, false), "192.0.2.7");
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let req = request(Some("10.0.0.1:80"), Some("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_identity(&req, false), "10.0.0.1");
        assert_eq!(client_identity(&req, true), "203.0.113.9");
    }

    #[test]
    fn test_garbage_forwarded_for_falls_back_to_peer() {
        let req = request(Some("10.0.0.1:80"), Some("not-an-ip"));
        assert_eq!(client_identity(&req, true), "10.0.0.1");
    }

    #[test]
    fn test_unknown_client() {
        let req = request(None, None);
        assert_eq!(client_identity(&req, true), UNKNOWN_CLIENT);
    }
}
