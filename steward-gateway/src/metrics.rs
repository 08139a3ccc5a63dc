//! Prometheus metrics registry.
//!
//! Series names, label sets and histogram buckets are an external
//! contract; dashboards and alerts key off them. Counters only ever go
//! up, and every update is atomic. Label cardinality is bounded by the
//! number of active API keys times three providers.
//!
//! | series | kind | labels |
//! |---|---|---|
//! | `llm_gateway_requests_total` | counter | api_key_id, provider, status |
//! | `llm_gateway_errors_total` | counter | api_key_id, provider, error_type |
//! | `llm_gateway_fallbacks_total` | counter | api_key_id, from_provider, to_provider |
//! | `llm_gateway_cost_total` | counter | api_key_id, provider, model |
//! | `llm_gateway_latency_seconds` | histogram | api_key_id, provider |

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::time::Duration;
use steward_providers::ProviderKind;
use uuid::Uuid;

const LATENCY_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];

/// Process-wide metrics registry.
pub struct Metrics {
    registry: Registry,
    pub(crate) requests_total: IntCounterVec,
    pub(crate) errors_total: IntCounterVec,
    pub(crate) fallbacks_total: IntCounterVec,
    pub(crate) cost_total: CounterVec,
    pub(crate) latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "llm_gateway_requests_total",
                "Chat completion requests by terminal status",
            ),
            &["api_key_id", "provider", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new(
                "llm_gateway_errors_total",
                "Failed provider attempts by error type",
            ),
            &["api_key_id", "provider", "error_type"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let fallbacks_total = IntCounterVec::new(
            Opts::new(
                "llm_gateway_fallbacks_total",
                "Requests served by a non-primary provider",
            ),
            &["api_key_id", "from_provider", "to_provider"],
        )?;
        registry.register(Box::new(fallbacks_total.clone()))?;

        let cost_total = CounterVec::new(
            Opts::new("llm_gateway_cost_total", "Accumulated cost in USD"),
            &["api_key_id", "provider", "model"],
        )?;
        registry.register(Box::new(cost_total.clone()))?;

        let latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "llm_gateway_latency_seconds",
                "Handler-level chain latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["api_key_id", "provider"],
        )?;
        registry.register(Box::new(latency_seconds.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            errors_total,
            fallbacks_total,
            cost_total,
            latency_seconds,
        })
    }

    pub fn record_success(&self, api_key_id: Uuid, provider: ProviderKind) {
        self.requests_total
            .with_label_values(&[&api_key_id.to_string(), provider.as_str(), "success"])
            .inc();
    }

    pub fn record_failure(&self, api_key_id: Uuid, provider: ProviderKind) {
        self.requests_total
            .with_label_values(&[&api_key_id.to_string(), provider.as_str(), "failure"])
            .inc();
    }

    pub fn record_error(&self, api_key_id: Uuid, provider: ProviderKind, error_type: &str) {
        self.errors_total
            .with_label_values(&[&api_key_id.to_string(), provider.as_str(), error_type])
            .inc();
    }

    pub fn record_fallback(&self, api_key_id: Uuid, from: ProviderKind, to: ProviderKind) {
        self.fallbacks_total
            .with_label_values(&[&api_key_id.to_string(), from.as_str(), to.as_str()])
            .inc();
    }

    pub fn add_cost(&self, api_key_id: Uuid, provider: ProviderKind, model: &str, cost: Decimal) {
        self.cost_total
            .with_label_values(&[&api_key_id.to_string(), provider.as_str(), model])
            .inc_by(cost.to_f64().unwrap_or(0.0));
    }

    pub fn observe_latency(&self, api_key_id: Uuid, provider: ProviderKind, elapsed: Duration) {
        self.latency_seconds
            .with_label_values(&[&api_key_id.to_string(), provider.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
