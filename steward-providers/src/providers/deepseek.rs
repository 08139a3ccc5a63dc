use crate::error::ProviderError;
use crate::models::{ChatRequest, ChatResponse};
use crate::providers::{Provider, ProviderConfig};

use super::http_client::HttpProviderClient;
use super::openai::{ChatBody, WireChatResponse};

const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
const DEFAULT_MODEL: &str = "deepseek-chat";

/// Adapter for the DeepSeek API.
///
/// DeepSeek follows the OpenAI chat-completions schema at its own base
/// URL, so translation and normalization are shared with the OpenAI
/// adapter.
pub struct DeepSeekProvider {
    http: HttpProviderClient,
}

impl DeepSeekProvider {
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

#[async_trait::async_trait]
impl Provider for DeepSeekProvider {
    fn name(&self) -> &str {
        "deepseek"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL).to_string();
        let body = ChatBody::from_request(&model, &request);
        let wire: WireChatResponse = self.http.post_json("/chat/completions", &body).await?;
        wire.normalize(&request)
    }
}
