//! Fallback chain execution.
//!
//! The executor walks the routed chain strictly in order: invoke one
//! adapter, classify the failure, record it, wait 500 ms, advance. No
//! concurrent fan-out — parallel speculation would double-charge and
//! muddy cost attribution. The first success wins; a success past index
//! zero counts as a fallback. When the chain runs dry the last
//! classified error is returned for the handler to map to 502.
//!
//! A retry-with-exponential-backoff helper can be composed around each
//! single attempt, but the default request path leaves it off: the chain
//! itself already provides three tries across different providers.

use std::sync::Arc;
use std::time::{Duration, Instant};
use steward_providers::{ChatRequest, ChatResponse, Provider, ProviderError, ProviderKind};
use uuid::Uuid;

use crate::metrics::Metrics;

const INTER_ATTEMPT_DELAY: Duration = Duration::from_millis(500);

/// Exponential backoff for retries around a single adapter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_base: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_base: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Run `operation` under `policy`, sleeping between attempts.
pub async fn run_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(error);
                }
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay.mul_f64(policy.backoff_base), policy.max_delay);
            }
        }
    }
}

/// Outcome of a chain walk that produced a response.
#[derive(Debug)]
pub struct ChainSuccess {
    pub provider: ProviderKind,
    pub response: ChatResponse,
    /// Wall-clock latency of the winning attempt alone.
    pub attempt_latency_ms: u64,
    pub fallback_used: bool,
    pub failed_attempts: u32,
}

/// Drives the routed provider chain for one request.
pub struct FallbackExecutor {
    metrics: Arc<Metrics>,
    inter_attempt_delay: Duration,
    retry_policy: Option<RetryPolicy>,
}

impl FallbackExecutor {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            inter_attempt_delay: INTER_ATTEMPT_DELAY,
            retry_policy: None,
        }
    }

    /// Compose per-attempt retries around every adapter invocation.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_inter_attempt_delay(mut self, delay: Duration) -> Self {
        self.inter_attempt_delay = delay;
        self
    }

    /// Walk the chain until one adapter succeeds.
    ///
    /// Every failed attempt is counted and logged before the walk
    /// advances; the caller only sees the final outcome.
    pub async fn execute(
        &self,
        chain: &[(ProviderKind, Arc<dyn Provider>)],
        request: &ChatRequest,
        api_key_id: Uuid,
        request_id: &str,
    ) -> Result<ChainSuccess, ProviderError> {
        let Some((primary, _)) = chain.first() else {
            return Err(ProviderError::Configuration {
                message: "provider chain is empty".to_string(),
            });
        };

        let mut last_error: Option<ProviderError> = None;

        for (index, (kind, adapter)) in chain.iter().enumerate() {
            let started = Instant::now();
            let result = match &self.retry_policy {
                Some(policy) => {
                    run_with_backoff(policy, || adapter.chat_completion(request.clone())).await
                }
                None => adapter.chat_completion(request.clone()).await,
            };
            let attempt_latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    let fallback_used = index > 0;
                    if fallback_used {
                        self.metrics.record_fallback(api_key_id, *primary, *kind);
                    }
                    tracing::debug!(
                        request_id,
                        provider = %kind,
                        latency_ms = attempt_latency_ms,
                        fallback_used,
                        "provider attempt succeeded"
                    );
                    return Ok(ChainSuccess {
                        provider: *kind,
                        response,
                        attempt_latency_ms,
                        fallback_used,
                        failed_attempts: index as u32,
                    });
                }
                Err(error) => {
                    self.metrics
                        .record_error(api_key_id, *kind, error.error_type());
                    tracing::warn!(
                        request_id,
                        provider = %kind,
                        error_type = error.error_type(),
                        latency_ms = attempt_latency_ms,
                        "provider attempt failed: {error}"
                    );
                    last_error = Some(error);
                    if index + 1 < chain.len() {
                        tokio::time::sleep(self.inter_attempt_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::Configuration {
            message: "provider chain is empty".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use steward_providers::{Choice, Message, Usage};

    /// Adapter double that replays a scripted sequence of outcomes.
    struct ScriptedProvider {
        name: &'static str,
        script: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    }

    impl ScriptedProvider {
        fn new(
            name: &'static str,
            script: Vec<Result<ChatResponse, ProviderError>>,
        ) -> Arc<dyn Provider> {
            Arc::new(Self {
                name,
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait::async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn default_model(&self) -> &str {
            "scripted-model"
        }

        async fn chat_completion(
            &self,
            _request: ChatRequest,
        ) -> Result<ChatResponse, ProviderError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::Timeout))
        }
    }

    fn ok_response(model: &str) -> ChatResponse {
        ChatResponse {
            id: "resp-1".to_string(),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant("hello"),
                finish_reason: Some("stop".to_string()),
            }],
            usage: Usage::new(10, 5),
            tokens_estimated: false,
        }
    }

    fn executor(metrics: &Arc<Metrics>) -> FallbackExecutor {
        FallbackExecutor::new(metrics.clone()).with_inter_attempt_delay(Duration::ZERO)
    }

    fn error_count(metrics: &Metrics, key: Uuid, provider: &str, error_type: &str) -> u64 {
        metrics
            .errors_total
            .with_label_values(&[&key.to_string(), provider, error_type])
            .get()
    }

    #[tokio::test]
    async fn primary_success_skips_fallback_accounting() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let key = Uuid::new_v4();
        let chain = vec![(
            ProviderKind::OpenAi,
            ScriptedProvider::new("openai", vec![Ok(ok_response("gpt-4"))]),
        )];

        let success = executor(&metrics)
            .execute(&chain, &ChatRequest::default(), key, "req-test")
            .await
            .unwrap();

        assert_eq!(success.provider, ProviderKind::OpenAi);
        assert!(!success.fallback_used);
        assert_eq!(success.failed_attempts, 0);
        let fallbacks = metrics
            .fallbacks_total
            .with_label_values(&[&key.to_string(), "openai", "openai"])
            .get();
        assert_eq!(fallbacks, 0);
    }

    #[tokio::test]
    async fn failed_primary_advances_to_next_provider() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let key = Uuid::new_v4();
        let chain = vec![
            (
                ProviderKind::OpenAi,
                ScriptedProvider::new(
                    "openai",
                    vec![Err(ProviderError::Api {
                        code: 500,
                        message: "boom".to_string(),
                    })],
                ),
            ),
            (
                ProviderKind::DeepSeek,
                ScriptedProvider::new("deepseek", vec![Ok(ok_response("deepseek-chat"))]),
            ),
        ];

        let success = executor(&metrics)
            .execute(&chain, &ChatRequest::default(), key, "req-test")
            .await
            .unwrap();

        assert_eq!(success.provider, ProviderKind::DeepSeek);
        assert!(success.fallback_used);
        assert_eq!(success.failed_attempts, 1);
        assert_eq!(error_count(&metrics, key, "openai", "provider_error"), 1);
        let fallbacks = metrics
            .fallbacks_total
            .with_label_values(&[&key.to_string(), "openai", "deepseek"])
            .get();
        assert_eq!(fallbacks, 1);
    }

    #[tokio::test]
    async fn exhausted_chain_returns_last_error_and_counts_every_attempt() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let key = Uuid::new_v4();
        let chain = vec![
            (
                ProviderKind::OpenAi,
                ScriptedProvider::new("openai", vec![Err(ProviderError::Timeout)]),
            ),
            (
                ProviderKind::DeepSeek,
                ScriptedProvider::new("deepseek", vec![Err(ProviderError::RateLimited)]),
            ),
            (
                ProviderKind::HuggingFace,
                ScriptedProvider::new("huggingface", vec![Err(ProviderError::Timeout)]),
            ),
        ];

        let error = executor(&metrics)
            .execute(&chain, &ChatRequest::default(), key, "req-test")
            .await
            .unwrap_err();

        assert!(matches!(error, ProviderError::Timeout));
        assert_eq!(error_count(&metrics, key, "openai", "timeout"), 1);
        assert_eq!(error_count(&metrics, key, "deepseek", "rate_limit"), 1);
        assert_eq!(error_count(&metrics, key, "huggingface", "timeout"), 1);
    }

    #[tokio::test]
    async fn backoff_retries_transient_failures_within_one_attempt() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let key = Uuid::new_v4();
        let chain = vec![(
            ProviderKind::OpenAi,
            ScriptedProvider::new(
                "openai",
                vec![
                    Err(ProviderError::RateLimited),
                    Err(ProviderError::RateLimited),
                    Ok(ok_response("gpt-4")),
                ],
            ),
        )];

        let policy = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            ..RetryPolicy::default()
        };
        let success = executor(&metrics)
            .with_retry_policy(policy)
            .execute(&chain, &ChatRequest::default(), key, "req-test")
            .await
            .unwrap();

        // The retries happen inside a single chain attempt, so no error
        // metric and no fallback are recorded.
        assert!(!success.fallback_used);
        assert_eq!(error_count(&metrics, key, "openai", "rate_limit"), 0);
    }

    #[tokio::test]
    async fn backoff_gives_up_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            backoff_base: 2.0,
            max_delay: Duration::from_millis(4),
        };

        let mut calls = 0;
        let result: Result<(), ProviderError> = run_with_backoff(&policy, || {
            calls += 1;
            async { Err(ProviderError::Timeout) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
