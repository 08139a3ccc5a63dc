//! Provider abstraction layer.
//!
//! Each upstream LLM API is wrapped by an adapter implementing
//! [`Provider`]: translate the internal request, make a single POST with
//! the provider's own secret, normalize the reply, classify failures.
//! Adapters never retry; retry and fallback belong to the executor that
//! drives the chain.

use crate::error::ProviderError;
use crate::models::{ChatRequest, ChatResponse};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod deepseek;
pub mod http_client;
pub mod huggingface;
pub mod openai;

/// The fixed set of upstream providers the gateway governs.
///
/// The declaration order is also the canonical fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    DeepSeek,
    HuggingFace,
}

/// Canonical fallback order: remaining providers are tried in this order
/// after the primary.
pub const FALLBACK_ORDER: [ProviderKind; 3] = [
    ProviderKind::OpenAi,
    ProviderKind::DeepSeek,
    ProviderKind::HuggingFace,
];

impl ProviderKind {
    /// Wire identifier used in metrics labels, log fields and persisted
    /// rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::HuggingFace => "huggingface",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::HuggingFace => "Hugging Face",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait implemented by every provider adapter.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Wire identifier of this provider.
    fn name(&self) -> &str;

    /// Model used when the request carries no override.
    fn default_model(&self) -> &str;

    /// Perform a single chat-completion call against the upstream API.
    ///
    /// The configured timeout bounds the whole call; expiry aborts the
    /// in-flight request and surfaces as [`ProviderError::Timeout`].
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Configuration for a single provider adapter.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Secret presented to the upstream API.
    pub api_key: String,
    /// Override of the upstream base URL; adapters supply their default.
    pub base_url: Option<String>,
    /// Total wall-clock deadline for one invocation.
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Create the adapter for `kind` from its configuration.
pub fn create_provider(
    kind: ProviderKind,
    config: ProviderConfig,
) -> Result<Box<dyn Provider>, ProviderError> {
    match kind {
        ProviderKind::OpenAi => Ok(Box::new(openai::OpenAiProvider::new(config)?)),
        ProviderKind::DeepSeek => Ok(Box::new(deepseek::DeepSeekProvider::new(config)?)),
        ProviderKind::HuggingFace => Ok(Box::new(huggingface::HuggingFaceProvider::new(config)?)),
    }
}
