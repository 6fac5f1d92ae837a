use anyhow::{Context, Result};

/// Connection settings for the hosted chat completion endpoint
#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}

impl ChatCompletionConfig {
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Read the configuration from the environment.
    ///
    /// `CHAT_API_KEY` is required; `CHAT_HOST` and `CHAT_MODEL` fall back to
    /// the hosted endpoint defaults.
    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("CHAT_API_KEY").context("CHAT_API_KEY environment variable not set")?;
        let host =
            std::env::var("CHAT_HOST").unwrap_or_else(|_| "https://api.openai.com".to_string());
        let model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Ok(Self {
            host,
            api_key,
            model,
        })
    }
}
