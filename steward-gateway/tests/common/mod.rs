//! Shared harness for the gateway integration tests.
//!
//! Spins up the real router over the in-memory store, with every
//! provider adapter pointed at its own wiremock server. The seeded API
//! key uses a minimum-cost bcrypt hash to keep the suite fast.

use axum_test::TestServer;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use steward_gateway::config::Settings;
use steward_gateway::server::create_server;
use steward_gateway::storage::{ApiKeyRecord, MemoryStore};
use uuid::Uuid;
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "sk-steward-integration-test";

pub struct TestGateway {
    pub server: TestServer,
    pub store: Arc<MemoryStore>,
    pub openai: MockServer,
    pub deepseek: MockServer,
    pub huggingface: MockServer,
    pub api_key_id: Uuid,
}

pub fn seed_api_key(
    store: &MemoryStore,
    plaintext: &str,
    rate_limit_per_minute: i32,
    is_active: bool,
) -> Uuid {
    let id = Uuid::new_v4();
    store.insert_key(ApiKeyRecord {
        id,
        key_hash: bcrypt::hash(plaintext, 4).expect("bcrypt hash"),
        name: "integration-test".to_string(),
        rate_limit_per_minute,
        is_active,
        created_at: Utc::now(),
    });
    id
}

pub async fn spawn_gateway() -> TestGateway {
    spawn_gateway_with_key(60, true).await
}

pub async fn spawn_gateway_with_key(rate_limit_per_minute: i32, is_active: bool) -> TestGateway {
    let openai = MockServer::start().await;
    let deepseek = MockServer::start().await;
    let huggingface = MockServer::start().await;

    let settings = Settings {
        database_url: None,
        openai_api_key: "sk-openai-test".to_string(),
        deepseek_api_key: "sk-deepseek-test".to_string(),
        huggingface_api_key: "hf-test".to_string(),
        secret_key: "integration-secret".to_string(),
        log_level: "info".to_string(),
        environment: "test".to_string(),
        provider_timeout: 5,
        openai_base_url: Some(openai.uri()),
        deepseek_base_url: Some(deepseek.uri()),
        huggingface_base_url: Some(huggingface.uri()),
    };

    let store = Arc::new(MemoryStore::new());
    let api_key_id = seed_api_key(&store, TEST_API_KEY, rate_limit_per_minute, is_active);

    let app = create_server(settings, store.clone()).expect("create server");
    let server = TestServer::new(app).expect("test server");

    TestGateway {
        server,
        store,
        openai,
        deepseek,
        huggingface,
        api_key_id,
    }
}

pub fn auth_header() -> String {
    format!("Bearer {TEST_API_KEY}")
}

/// Minimal OpenAI-style success body with the given usage counts.
pub fn chat_completion_body(model: &str, content: &str, tokens_in: u32, tokens_out: u32) -> Value {
    json!({
        "id": "upstream-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": tokens_in,
            "completion_tokens": tokens_out,
            "total_tokens": tokens_in + tokens_out
        }
    })
}

/// Find a series value in the Prometheus exposition, tolerating any
/// label ordering.
pub fn metric_value(text: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    text.lines()
        .find(|line| {
            line.starts_with(name)
                && labels
                    .iter()
                    .all(|(key, value)| line.contains(&format!("{key}=\"{value}\"")))
        })
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|value| value.parse().ok())
}
