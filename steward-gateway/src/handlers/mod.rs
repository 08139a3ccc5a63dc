//! HTTP request handlers.
//!
//! The chat-completion handler is the spine of the gateway. For one
//! request it runs, strictly in order: request-id generation,
//! authentication, rate limiting, body validation, routing, the fallback
//! chain, then cost calculation, persistence, metrics and the structured
//! completion log. Failures short-circuit with the matching status code;
//! a cost-write failure is the one exception that never fails the
//! request.
//!
//! The remaining endpoints are thin: liveness, the Prometheus exposition,
//! an unauthenticated routing preview, and read-only cost analytics over
//! the persisted rows.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use steward_providers::{
    pricing, route, Budget, ChatRequest, Choice, Message, RouteHints, TaskKind, Usage,
    FALLBACK_ORDER,
};

use crate::gateway_error::GatewayError;
use crate::server::AppState;
use crate::storage::{ApiKeyRecord, CostRecord, CostSummaryRow, NewCostRecord};

/// Generate the per-request correlation identifier: `req-` plus sixteen
/// random hex characters, unique for the life of the process.
fn new_request_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill(&mut bytes[..]);
    let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("req-{hex}")
}

fn bearer_credential(headers: &HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| GatewayError::Auth {
            message: "Missing Authorization header".to_string(),
        })?;

    value
        .strip_prefix("Bearer ")
        .filter(|credential| !credential.is_empty())
        .ok_or_else(|| GatewayError::Auth {
            message: "Authorization header must be 'Bearer <key>'".to_string(),
        })
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    request_id: &str,
) -> Result<ApiKeyRecord, GatewayError> {
    let credential = bearer_credential(headers)?;
    state
        .authenticator
        .authenticate(credential)
        .await
        .inspect_err(|_| {
            tracing::warn!(request_id, "authentication failure");
        })
}

/// Client-facing chat-completion request body.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub task: Option<TaskKind>,
    #[serde(default)]
    pub budget: Option<Budget>,
    #[serde(default)]
    pub latency_sensitive: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f32>,
}

impl ChatCompletionRequest {
    fn validate(&self) -> Result<(), GatewayError> {
        fn invalid(message: impl Into<String>) -> GatewayError {
            GatewayError::InvalidRequest {
                message: message.into(),
            }
        }

        if self.messages.is_empty() {
            return Err(invalid("messages must not be empty"));
        }
        for (index, message) in self.messages.iter().enumerate() {
            if message.content.is_empty() {
                return Err(invalid(format!(
                    "messages[{index}].content must not be empty"
                )));
            }
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(invalid("temperature must be between 0 and 2"));
            }
        }
        if let Some(top_p) = self.top_p {
            if !(0.0..=1.0).contains(&top_p) {
                return Err(invalid("top_p must be between 0 and 1"));
            }
        }
        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                return Err(invalid("max_tokens must be at least 1"));
            }
        }
        Ok(())
    }

    fn hints(&self) -> RouteHints {
        RouteHints {
            task: self.task,
            budget: self.budget,
            latency_sensitive: self.latency_sensitive,
        }
    }

    fn into_chat_request(self) -> ChatRequest {
        ChatRequest {
            model: self.model,
            messages: self.messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Client-facing chat-completion response.
#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub provider: &'static str,
    pub cost_usd: Decimal,
    #[serde(skip_serializing_if = "is_false")]
    pub tokens_estimated: bool,
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<ChatCompletionResponse>, GatewayError> {
    let request_id = new_request_id();

    let api_key = authenticate(&state, &headers, &request_id).await?;

    if !state
        .rate_limiter
        .try_acquire(api_key.id, api_key.rate_limit_per_minute.max(0) as u32)
    {
        tracing::warn!(%request_id, api_key_id = %api_key.id, "rate limit rejection");
        return Err(GatewayError::RateLimited);
    }

    let request: ChatCompletionRequest =
        serde_json::from_value(body).map_err(|e| GatewayError::InvalidRequest {
            message: format!("invalid request body: {e}"),
        })?;
    request.validate()?;

    let decision = route(&request.hints(), &state.providers.available()).ok_or_else(|| {
        GatewayError::Internal {
            message: "no providers configured".to_string(),
        }
    })?;
    let chain = state.providers.chain(&decision.chain);
    let chat_request = request.into_chat_request();

    let chain_started = Instant::now();
    let outcome = state
        .executor
        .execute(&chain, &chat_request, api_key.id, &request_id)
        .await;
    let chain_elapsed = chain_started.elapsed();

    match outcome {
        Ok(success) => {
            let provider = success.provider;
            let usage = success.response.usage;
            let cost_usd = pricing::cost(
                provider,
                &success.response.model,
                usage.prompt_tokens,
                usage.completion_tokens,
            )
            .round_dp(6);

            state.metrics.record_success(api_key.id, provider);
            state
                .metrics
                .add_cost(api_key.id, provider, &success.response.model, cost_usd);
            state
                .metrics
                .observe_latency(api_key.id, provider, chain_elapsed);

            let record = NewCostRecord {
                api_key_id: api_key.id,
                request_id: request_id.clone(),
                provider: provider.as_str().to_string(),
                model: success.response.model.clone(),
                tokens_in: usage.prompt_tokens as i32,
                tokens_out: usage.completion_tokens as i32,
                cost_usd,
                latency_ms: success.attempt_latency_ms as i32,
            };
            if let Err(error) = state.store.insert_cost_record(&record).await {
                tracing::error!(
                    %request_id,
                    api_key_id = %api_key.id,
                    provider = %provider,
                    "failed to persist cost record: {error}"
                );
            }

            tracing::info!(
                %request_id,
                api_key_id = %api_key.id,
                provider = %provider,
                latency_ms = chain_elapsed.as_millis() as u64,
                cost_usd = %cost_usd,
                fallback_used = success.fallback_used,
                "chat completion served"
            );

            Ok(Json(ChatCompletionResponse {
                id: request_id,
                object: "chat.completion",
                created: chrono::Utc::now().timestamp(),
                model: success.response.model,
                choices: success.response.choices,
                usage,
                provider: provider.as_str(),
                cost_usd,
                tokens_estimated: success.response.tokens_estimated,
            }))
        }
        Err(error) => {
            state.metrics.record_failure(api_key.id, decision.primary);
            tracing::error!(
                %request_id,
                api_key_id = %api_key.id,
                error_type = error.error_type(),
                "all providers exhausted: {error}"
            );
            Err(GatewayError::ProvidersExhausted {
                request_id,
                message: error.to_string(),
            })
        }
    }
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    let body = state.metrics.render().map_err(|e| GatewayError::Internal {
        message: format!("failed to render metrics: {e}"),
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RoutingPreviewParams {
    #[serde(default)]
    pub task: Option<TaskKind>,
    #[serde(default)]
    pub budget: Option<Budget>,
    #[serde(default)]
    pub latency_sensitive: bool,
}

#[derive(Debug, Serialize)]
pub struct RoutingPreviewResponse {
    pub selected_provider: &'static str,
    pub provider_name: &'static str,
    pub reason: String,
    pub fallback_chain: Vec<&'static str>,
}

/// `GET /v1/routing/preview`
///
/// Dry-run of the router for the given hints. `fallback_chain` reports
/// the canonical provider order the executor falls back through.
pub async fn routing_preview(
    State(state): State<AppState>,
    Query(params): Query<RoutingPreviewParams>,
) -> Result<Json<RoutingPreviewResponse>, GatewayError> {
    let hints = RouteHints {
        task: params.task,
        budget: params.budget,
        latency_sensitive: params.latency_sensitive,
    };
    let decision =
        route(&hints, &state.providers.available()).ok_or_else(|| GatewayError::Internal {
            message: "no providers configured".to_string(),
        })?;

    Ok(Json(RoutingPreviewResponse {
        selected_provider: decision.primary.as_str(),
        provider_name: decision.primary.display_name(),
        reason: decision.reason,
        fallback_chain: FALLBACK_ORDER.iter().map(|kind| kind.as_str()).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct CostSummaryResponse {
    pub total_cost_usd: Decimal,
    pub total_requests: i64,
    pub total_tokens_in: i64,
    pub total_tokens_out: i64,
    pub by_provider: Vec<CostSummaryRow>,
}

/// `GET /v1/costs/summary`
pub async fn cost_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CostSummaryResponse>, GatewayError> {
    let request_id = new_request_id();
    let api_key = authenticate(&state, &headers, &request_id).await?;

    let rows = state.store.cost_summary(api_key.id).await?;
    let summary = CostSummaryResponse {
        total_cost_usd: rows.iter().map(|row| row.cost_usd).sum(),
        total_requests: rows.iter().map(|row| row.requests).sum(),
        total_tokens_in: rows.iter().map(|row| row.tokens_in).sum(),
        total_tokens_out: rows.iter().map(|row| row.tokens_out).sum(),
        by_provider: rows,
    };
    Ok(Json(summary))
}

fn default_records_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct CostRecordsParams {
    #[serde(default = "default_records_limit")]
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct CostRecordsResponse {
    pub records: Vec<CostRecord>,
}

/// `GET /v1/costs/records`
pub async fn cost_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CostRecordsParams>,
) -> Result<Json<CostRecordsResponse>, GatewayError> {
    let request_id = new_request_id();
    let api_key = authenticate(&state, &headers, &request_id).await?;

    let limit = params.limit.clamp(1, 500);
    let records = state.store.recent_cost_records(api_key.id, limit).await?;
    Ok(Json(CostRecordsResponse { records }))
}
