//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the public and protected route groups
//! - Wrap each group in its gate chain
//! - Wire up middleware (tracing, timeout, request ID, metrics)
//! - Bind the gateway and admin listeners and shut both down gracefully

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    http::{Request, StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::{self, AdminState};
use crate::config::GatewayConfig;
use crate::http::chain::GateChain;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::{shutdown, Shutdown};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::security::{
    AdmissionGate, AdmissionPolicy, AdmissionState, AuthGate, StaticTokenVerifier, TokenVerifier,
};
use crate::store::{CounterStore, KeySpace};

/// HTTP server for the admission gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    gate: AdmissionGate,
}

impl HttpServer {
    /// Create a server with the built-in echo routes.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn CounterStore>,
        verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> Self {
        Self::with_routes(config, store, verifier, default_public(), default_protected())
    }

    /// Create a server around caller-supplied route groups.
    ///
    /// `public` routes pass the admission gate and the retry wrapper;
    /// `protected` routes additionally require a bearer credential.
    pub fn with_routes(
        config: GatewayConfig,
        store: Arc<dyn CounterStore>,
        verifier: Option<Arc<dyn TokenVerifier>>,
        public: Router,
        protected: Router,
    ) -> Self {
        let gate = AdmissionGate::new(store, AdmissionPolicy::from(&config.admission))
            .with_keys(KeySpace::new(config.store.key_prefix.clone()));

        let mut chain = GateChain::new();
        if config.admission.enabled {
            chain = chain.with_admission(AdmissionState {
                gate: gate.clone(),
                trust_forwarded_for: config.admission.trust_forwarded_for,
            });
        }
        if config.retry.enabled {
            chain = chain.with_retry(RetryPolicy::from(&config.retry));
        }

        let mut protected_chain = chain.clone();
        if config.auth.enabled {
            // Without verifier material nothing can authenticate.
            let verifier = verifier
                .unwrap_or_else(|| Arc::new(StaticTokenVerifier::new(Vec::<String>::new())));
            protected_chain = protected_chain.with_auth(AuthGate::new(verifier));
        }

        let router = Self::build_router(
            &config,
            chain.apply(public),
            protected_chain.apply(protected),
        );

        Self {
            router,
            config,
            gate,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, public: Router, protected: Router) -> Router {
        Router::new()
            .route("/health", get(health))
            .merge(public)
            .merge(protected)
            .fallback(not_found)
            .layer(middleware::from_fn(track_request))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = request_id(request).unwrap_or("-"),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The admission gate shared by every route group.
    pub fn admission_gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. Starts the admin API first when enabled.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let state = AdminState {
                gate: self.gate.clone(),
                api_key: Arc::from(self.config.admin.api_key.as_str()),
            };
            let rx = shutdown.subscribe();
            tokio::spawn(async move {
                if let Err(e) = admin::serve(admin_listener, state, rx).await {
                    tracing::error!(error = %e, "Admin API failed");
                }
            });
        }

        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

fn default_public() -> Router {
    Router::new().route("/api/echo", any(echo))
}

fn default_protected() -> Router {
    Router::new().route("/api/protected/echo", any(echo))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn echo(body: Bytes) -> Bytes {
    body
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not_found", "message": format!("no route for {}", uri.path()) })),
    )
}

/// Record end-to-end latency by final status.
async fn track_request(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_request(response.status().as_u16(), start);
    response
}
