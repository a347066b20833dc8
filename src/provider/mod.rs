pub mod openai;
pub mod wire;

use crate::config;
use crate::models::{Message, Tool};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use openai::OpenAiProvider;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A chat model that can answer a conversation, optionally calling tools.
///
/// Every call is a single blocking round-trip.
pub trait Provider {
    fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)>;
}

impl<P: Provider + ?Sized> Provider for &P {
    fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)> {
        (**self).complete(messages, tools)
    }
}

/// Connection and sampling settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub seed: u64,
    pub max_tokens: Option<u32>,
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl ProviderConfig {
    /// Resolve the API key named by `api_key_env` once, at construction.
    pub fn from_model(cfg: &config::Model) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).map_err(|_| {
            anyhow!(
                "environment variable '{}' is required but not set",
                cfg.api_key_env
            )
        })?;
        Ok(Self::with_key(cfg, api_key))
    }

    pub fn with_key(cfg: &config::Model, api_key: String) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            seed: cfg.seed,
            max_tokens: (cfg.max_tokens > 0).then_some(cfg.max_tokens),
            timeout: (cfg.request_timeout_seconds > 0)
                .then(|| Duration::from_secs(cfg.request_timeout_seconds)),
            max_retries: cfg.max_retries,
            retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
        }
    }
}
