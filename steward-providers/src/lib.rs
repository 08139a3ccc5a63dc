//! # Steward Providers
//!
//! Provider-facing half of the steward gateway: the internal
//! chat-completion contract, adapters for the three governed upstream
//! APIs (OpenAI, DeepSeek, HuggingFace inference), the deterministic
//! router, and the static pricing table.
//!
//! The gateway crate composes these pieces into the request pipeline;
//! nothing here retries, rate-limits, records cost or emits metrics —
//! adapters make exactly one upstream call and classify its outcome.

pub mod error;
pub mod models;
pub mod pricing;
pub mod providers;
pub mod routing;

pub use error::ProviderError;
pub use models::{ChatRequest, ChatResponse, Choice, Message, Role, Usage};
pub use providers::{
    create_provider, Provider, ProviderConfig, ProviderKind, FALLBACK_ORDER,
};
pub use routing::{route, Budget, RouteDecision, RouteHints, TaskKind};
