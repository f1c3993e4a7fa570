//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, routing::any, Router};
use tokio::net::TcpListener;

use admission_gateway::admin::{self, AdminState};
use admission_gateway::config::GatewayConfig;
use admission_gateway::security::{verifier_from_config, AdmissionGate};
use admission_gateway::store::{CounterStore, InMemoryStore};
use admission_gateway::{HttpServer, Shutdown};

/// A gateway running on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub gate: AdmissionGate,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config with small limits and a known static token.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.auth.static_tokens = vec!["test-token".to_string()];
    config.retry.delay_ms = 10;
    config
}

/// Start the gateway with its built-in routes and an in-memory store.
pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let verifier = verifier_from_config(&config.auth);
    let server = HttpServer::new(config, Arc::new(InMemoryStore::new()), verifier);
    serve(server).await
}

/// Start the gateway around custom route groups and store.
pub async fn start_gateway_with(
    config: GatewayConfig,
    store: Arc<dyn CounterStore>,
    public: Router,
    protected: Router,
) -> TestGateway {
    let verifier = verifier_from_config(&config.auth);
    let server = HttpServer::with_routes(config, store, verifier, public, protected);
    serve(server).await
}

async fn serve(server: HttpServer) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let gate = server.admission_gate().clone();
    let shutdown = Shutdown::new();

    let s = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, s).await.unwrap();
    });

    TestGateway {
        addr,
        shutdown,
        gate,
    }
}

/// Start the admin API for `gate` on an ephemeral port.
pub async fn start_admin(gate: AdmissionGate, api_key: &str, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AdminState {
        gate,
        api_key: Arc::from(api_key),
    };
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        admin::serve(listener, state, rx).await.unwrap();
    });
    addr
}

/// Router whose handler at `path` fails `failures` times with a 500, then
/// answers 200 "recovered". Every invocation is counted.
pub fn flaky_router(path: &str, failures: u32, calls: Arc<AtomicU32>) -> Router {
    Router::new().route(
        path,
        any(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n <= failures {
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("attempt {n} failed")).into_response()
                } else {
                    (StatusCode::OK, "recovered").into_response()
                }
            }
        }),
    )
}
