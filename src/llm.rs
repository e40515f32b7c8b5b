//! LLM provider abstraction and implementations.
//!
//! Defines the [`LlmProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when no LLM is configured.
//! - **[`GeminiProvider`]**: calls the Gemini `generateContent` REST API.
//!
//! Callers treat the provider as an opaque text-in/text-out collaborator.
//! Providers never retry; a failed call is reported once and the caller
//! decides what a failure means (for lookups it means "not found").
//!
//! # Provider Selection
//!
//! ```rust
//! # use price_desk::config::LlmConfig;
//! # use price_desk::llm::create_provider;
//! let config = LlmConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.name(), "disabled");
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;

/// A text completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier (e.g. `"gemini-1.5-flash"`).
    fn name(&self) -> &str;

    /// Send one prompt and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Instantiate the provider named in `[llm].provider`.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "gemini" => Ok(Arc::new(GeminiProvider::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// A provider that refuses every call.
///
/// With this provider lookups still work through the SKU and description
/// tiers; the external tier always misses.
pub struct DisabledProvider;

#[async_trait]
impl LlmProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("LLM provider is disabled")
    }
}

// ============ Gemini Provider ============

/// Provider backed by the Gemini `generateContent` endpoint.
///
/// Reads the API key from the environment variable named by
/// `llm.api_key_env` (default `GEMINI_API_KEY`).
pub struct GeminiProvider {
    model: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("llm.model required for Gemini provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_generate_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_generate_response(json: &serde_json::Value) -> Result<String> {
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Gemini response has no candidate content"))?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        bail!("Gemini response contained no text");
    }
    Ok(text)
}

/// List the models that support `generateContent`, without the `models/` prefix.
pub async fn list_models(config: &LlmConfig) -> Result<Vec<String>> {
    let api_key = std::env::var(&config.api_key_env)
        .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let url = format!("{}/models", config.endpoint.trim_end_matches('/'));

    let mut models = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let mut request = client.get(&url).query(&[("key", api_key.as_str())]);
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }
        let response = request.send().await.context("Gemini request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }
        let json: serde_json::Value = response.json().await?;
        models.extend(parse_model_list(&json));

        page_token = json["nextPageToken"].as_str().map(str::to_string);
        if page_token.is_none() {
            break;
        }
    }
    Ok(models)
}

fn parse_model_list(json: &serde_json::Value) -> Vec<String> {
    json["models"]
        .as_array()
        .map(|models| {
            models
                .iter()
                .filter(|m| {
                    m["supportedGenerationMethods"]
                        .as_array()
                        .is_some_and(|methods| {
                            methods.iter().any(|v| v.as_str() == Some("generateContent"))
                        })
                })
                .filter_map(|m| m["name"].as_str())
                .map(|name| name.trim_start_matches("models/").to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Strip markdown code fences from a model reply.
pub fn strip_code_fences(text: &str) -> String {
    text.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Pull the outermost `open..close` block (e.g. `[`..`]`) out of a chatty reply.
pub fn extract_json_block(text: &str, open: char, close: char) -> Option<String> {
    let text = strip_code_fences(text);
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}
