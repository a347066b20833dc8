use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::wire::{
    check_openai_context_length_error, messages_to_openai_spec, openai_response_to_message,
    tools_to_openai_spec,
};
use super::{Provider, ProviderConfig, Usage};
use crate::models::{Message, Tool};

pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        // reqwest's blocking client defaults to a 30s timeout; grading calls
        // routinely exceed that, so only set one when configured.
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .with_context(|| "building HTTP client")?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let Some(usage) = data.get("usage") else {
            return Usage::default();
        };

        let input_tokens = usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let output_tokens = usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    fn post(&self, payload: &Value) -> Result<Value> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut attempt = 0u32;
        loop {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_key)
                .json(payload)
                .send()
                .with_context(|| format!("POST {}", url))?;

            let status = response.status();
            if status == StatusCode::OK {
                return response.json().with_context(|| "decoding completion JSON");
            }

            let body = response.text().unwrap_or_default();
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.config.max_retries {
                attempt += 1;
                let wait = self.config.retry_backoff * attempt;
                warn!(
                    "model request failed with {status}; retry {attempt}/{} in {:?}",
                    self.config.max_retries, wait
                );
                std::thread::sleep(wait);
                continue;
            }

            if let Ok(parsed) = serde_json::from_str::<Value>(&body) {
                if let Some(error) = parsed.get("error") {
                    if let Some(err) = check_openai_context_length_error(error) {
                        return Err(err.into());
                    }
                }
            }
            return Err(anyhow!("model request failed: {}\n{}", status, body));
        }
    }
}

impl Provider for OpenAiProvider {
    fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)> {
        let tools_spec = tools_to_openai_spec(tools)?;

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_to_openai_spec(messages),
            "temperature": self.config.temperature,
            "seed": self.config.seed,
        });
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        debug!(model = %self.config.model, turns = messages.len(), "model request");
        let response = self.post(&payload)?;

        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("model API error: {}", error));
        }

        let message = openai_response_to_message(&response)?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }
}
