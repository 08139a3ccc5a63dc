//! Environment-sourced gateway configuration.
//!
//! All settings are read once at startup from the process environment
//! (`DATABASE_URL`, `OPENAI_API_KEY`, `DEEPSEEK_API_KEY`,
//! `HUGGINGFACE_API_KEY`, `SECRET_KEY`, `LOG_LEVEL`, `ENVIRONMENT`,
//! `PROVIDER_TIMEOUT`, plus optional per-provider base-URL overrides).
//! A provider with an empty key is simply not available for routing.

use serde::Deserialize;
use std::time::Duration;
use steward_providers::{ProviderConfig, ProviderKind};

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_provider_timeout() -> u64 {
    30
}

/// Gateway settings, deserialized from the environment at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Postgres connection string. When absent the gateway runs on the
    /// in-memory store, which is only suitable for development and tests.
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub deepseek_api_key: String,
    #[serde(default)]
    pub huggingface_api_key: String,

    /// Process secret; keys the authenticator's credential fingerprints.
    pub secret_key: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Per-attempt provider deadline in seconds.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout: u64,

    #[serde(default)]
    pub openai_base_url: Option<String>,
    #[serde(default)]
    pub deepseek_base_url: Option<String>,
    #[serde(default)]
    pub huggingface_base_url: Option<String>,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    /// Reject configurations the gateway cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.secret_key.is_empty() {
            anyhow::bail!("SECRET_KEY must not be empty");
        }
        if self.provider_timeout == 0 {
            anyhow::bail!("PROVIDER_TIMEOUT must be at least 1 second");
        }
        if self.available_providers().is_empty() {
            anyhow::bail!(
                "at least one of OPENAI_API_KEY, DEEPSEEK_API_KEY, HUGGINGFACE_API_KEY must be set"
            );
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout)
    }

    fn credentials(&self, kind: ProviderKind) -> (&str, Option<&String>) {
        match kind {
            ProviderKind::OpenAi => (&self.openai_api_key, self.openai_base_url.as_ref()),
            ProviderKind::DeepSeek => (&self.deepseek_api_key, self.deepseek_base_url.as_ref()),
            ProviderKind::HuggingFace => (
                &self.huggingface_api_key,
                self.huggingface_base_url.as_ref(),
            ),
        }
    }

    /// Providers with a configured secret, in canonical order.
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        steward_providers::FALLBACK_ORDER
            .into_iter()
            .filter(|kind| !self.credentials(*kind).0.is_empty())
            .collect()
    }

    /// Adapter configuration for one provider.
    pub fn provider_config(&self, kind: ProviderKind) -> ProviderConfig {
        let (api_key, base_url) = self.credentials(kind);
        let mut config = ProviderConfig::new(api_key).with_timeout(self.provider_timeout());
        if let Some(base_url) = base_url {
            config = config.with_base_url(base_url.clone());
        }
        config
    }
}
