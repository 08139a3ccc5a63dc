use crate::error::ProviderError;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Thin HTTP client shared by the provider adapters.
///
/// Carries the upstream base URL, the provider's bearer secret and the
/// per-invocation deadline. The deadline is enforced by the underlying
/// reqwest client, so an expired call is aborted mid-flight.
#[derive(Clone)]
pub struct HttpProviderClient {
    http: Client,
    base_url: String,
    default_headers: HeaderMap,
}

impl HttpProviderClient {
    pub fn new(
        timeout: Duration,
        base_url: Option<String>,
        default_base: &str,
        bearer_token: &str,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            ProviderError::Configuration {
                message: format!("failed to create HTTP client: {e}"),
            }
        })?;

        let mut default_headers = HeaderMap::new();
        let auth_value = format!("Bearer {bearer_token}")
            .parse()
            .map_err(|_| ProviderError::Configuration {
                message: "provider secret contains invalid header characters".to_string(),
            })?;
        default_headers.insert("Authorization", auth_value);

        let base_url = base_url.unwrap_or_else(|| default_base.to_string());

        Ok(Self {
            http,
            base_url,
            default_headers,
        })
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url.trim_end_matches('/'), path)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), path)
        }
    }

    pub async fn post_json<TReq: Serialize, TResp: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TResp, ProviderError> {
        let url = self.build_url(path);
        let resp = self
            .http
            .request(Method::POST, url.clone())
            .headers(self.default_headers.clone())
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            tracing::debug!(
                url = %url,
                status = resp.status().as_u16(),
                "provider returned non-success"
            );
            return Err(map_error_response(resp).await);
        }
        Ok(resp.json::<TResp>().await?)
    }
}

/// Classify a non-success upstream response into the error taxonomy.
pub async fn map_error_response(resp: Response) -> ProviderError {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => {
            // Try to pull a message from common JSON error shapes
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").cloned())
                .and_then(|e| {
                    e.get("message")
                        .and_then(|m| m.as_str().map(|s| s.to_string()))
                        .or_else(|| e.as_str().map(|s| s.to_string()))
                })
                .unwrap_or_else(|| body.clone());

            match status.as_u16() {
                429 => ProviderError::RateLimited,
                code => ProviderError::Api { code, message },
            }
        }
        Err(_) => ProviderError::Api {
            code: status.as_u16(),
            message: "failed to read error response".to_string(),
        },
    }
}
