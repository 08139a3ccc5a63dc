//! HTTP server assembly.
//!
//! Builds the shared [`AppState`] — adapters, authenticator, rate
//! limiter, fallback executor, metrics, store — and mounts the routes.
//! Authentication runs inside the handlers rather than as middleware so
//! the pipeline's status-code ordering (401 before 429 before 400) stays
//! exact, and so the unauthenticated endpoints stay trivially so.

use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use steward_providers::{create_provider, Provider, ProviderError, ProviderKind, FALLBACK_ORDER};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::auth::Authenticator;
use crate::config::Settings;
use crate::fallback::FallbackExecutor;
use crate::handlers;
use crate::metrics::Metrics;
use crate::rate_limit::RateLimiter;
use crate::storage::GatewayStore;

/// The configured provider adapters, keyed by kind.
pub struct ProviderSet {
    adapters: HashMap<ProviderKind, Arc<dyn Provider>>,
}

impl ProviderSet {
    /// Build adapters for every provider with a configured secret.
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let mut adapters: HashMap<ProviderKind, Arc<dyn Provider>> = HashMap::new();
        for kind in settings.available_providers() {
            let adapter = create_provider(kind, settings.provider_config(kind))?;
            adapters.insert(kind, Arc::from(adapter));
        }
        Ok(Self { adapters })
    }

    /// Available providers in canonical order.
    pub fn available(&self) -> Vec<ProviderKind> {
        FALLBACK_ORDER
            .into_iter()
            .filter(|kind| self.adapters.contains_key(kind))
            .collect()
    }

    /// Materialize a routed chain into (kind, adapter) pairs.
    pub fn chain(&self, kinds: &[ProviderKind]) -> Vec<(ProviderKind, Arc<dyn Provider>)> {
        kinds
            .iter()
            .filter_map(|kind| {
                self.adapters
                    .get(kind)
                    .map(|adapter| (*kind, adapter.clone()))
            })
            .collect()
    }
}

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn GatewayStore>,
    pub authenticator: Arc<Authenticator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub providers: Arc<ProviderSet>,
    pub executor: Arc<FallbackExecutor>,
    pub metrics: Arc<Metrics>,
}

/// Create the gateway router over the given store.
pub fn create_server(settings: Settings, store: Arc<dyn GatewayStore>) -> anyhow::Result<Router> {
    let providers = Arc::new(ProviderSet::from_settings(&settings)?);
    let metrics = Arc::new(Metrics::new()?);
    let authenticator = Arc::new(Authenticator::new(store.clone(), settings.secret_key.clone()));
    let executor = Arc::new(FallbackExecutor::new(metrics.clone()));

    let state = AppState {
        settings: Arc::new(settings),
        store,
        authenticator,
        rate_limiter: Arc::new(RateLimiter::new()),
        providers,
        executor,
        metrics,
    };

    let app = Router::new()
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/routing/preview", get(handlers::routing_preview))
        .route("/v1/costs/summary", get(handlers::cost_summary))
        .route("/v1/costs/records", get(handlers::cost_records))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    Ok(app)
}
