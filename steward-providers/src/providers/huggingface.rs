use crate::error::ProviderError;
use crate::models::{estimate_tokens, ChatRequest, ChatResponse, Choice, Message, Usage};
use crate::providers::{Provider, ProviderConfig};
use serde::{Deserialize, Serialize};

use super::http_client::HttpProviderClient;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";
const DEFAULT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

/// Adapter for the HuggingFace inference API.
///
/// The inference endpoint takes a flattened prompt rather than a message
/// list and reports no token usage, so counts are always estimated.
pub struct HuggingFaceProvider {
    http: HttpProviderClient,
}

impl HuggingFaceProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = HttpProviderClient::new(
            config.timeout,
            config.base_url.clone(),
            DEFAULT_BASE_URL,
            &config.api_key,
        )?;
        Ok(Self { http })
    }
}

#[derive(Debug, Serialize)]
struct InferenceBody {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

#[async_trait::async_trait]
impl Provider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL).to_string();
        let prompt = request.flattened_prompt();

        let body = InferenceBody {
            inputs: prompt.clone(),
            parameters: InferenceParameters {
                temperature: request.temperature,
                max_new_tokens: request.max_tokens,
                return_full_text: false,
            },
        };

        let outputs: Vec<GeneratedText> = self
            .http
            .post_json(&format!("/models/{model}"), &body)
            .await?;
        let generated = outputs
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse {
                message: "inference response carried no generations".to_string(),
            })?;

        let usage = Usage::new(
            estimate_tokens(&prompt),
            estimate_tokens(&generated.generated_text),
        );

        Ok(ChatResponse {
            id: format!("hf-{}", chrono::Utc::now().timestamp_millis()),
            model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(generated.generated_text),
                finish_reason: Some("stop".to_string()),
            }],
            usage,
            tokens_estimated: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn flattens_messages_and_estimates_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/some-org/some-model"))
            .and(body_partial_json(json!({
                "inputs": "user: Reason about Y\n"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"generated_text": "Because of Z."}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HuggingFaceProvider::new(
            ProviderConfig::new("hf-test")
                .with_base_url(server.uri())
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap();

        let response = provider
            .chat_completion(ChatRequest {
                model: Some("some-org/some-model".to_string()),
                messages: vec![Message::user("Reason about Y")],
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(response.first_content(), Some("Because of Z."));
        assert!(response.tokens_estimated);
        // "user: Reason about Y\n" is 21 characters -> 5 estimated tokens.
        assert_eq!(response.usage.prompt_tokens, 5);
        // "Because of Z." is 13 characters -> 3 estimated tokens.
        assert_eq!(response.usage.completion_tokens, 3);
    }

    #[tokio::test]
    async fn empty_generation_array_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let provider = HuggingFaceProvider::new(
            ProviderConfig::new("hf-test")
                .with_base_url(server.uri())
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap();

        let err = provider
            .chat_completion(ChatRequest {
                model: Some("m".to_string()),
                messages: vec![Message::user("hi")],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }
}
