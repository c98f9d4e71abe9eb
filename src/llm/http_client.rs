//! OpenAI-compatible chat-completions (JSON mode) and embeddings HTTP
//! client. Retries transport failures with a fixed backoff, mirroring the
//! teacher's `HttpProviderClient`; schema-conformance retries happen
//! in-place here too (spec §7: "retried in-place up to 3 times").

use crate::error::{EngineError, Result};
use crate::ports::{Embedder, Embedding, JsonModelClient};
use crate::cache::LlmCache;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection and model settings for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub schema_retry_attempts: u32,
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: None,
            chat_model: "llama3".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            timeout_secs: 15,
            max_retries: 3,
            schema_retry_attempts: 3,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Shared HTTP plumbing, mirroring the teacher's `HttpProviderClient`.
struct HttpCore {
    client: Client,
    config: OpenAiCompatibleConfig,
    cache: Option<Arc<LlmCache>>,
}

impl HttpCore {
    fn new(config: OpenAiCompatibleConfig, cache: Option<Arc<LlmCache>>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build reqwest client");
        Self { client, config, cache }
    }

    fn build_url(&self, endpoint: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        format!("{base}/{endpoint}")
    }

    fn auth_header(&self) -> Option<(&'static str, String)> {
        self.config.api_key.as_ref().map(|key| ("Authorization", format!("Bearer {key}")))
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(&self, endpoint: &str, body: &B) -> Result<R> {
        let url = self.build_url(endpoint);
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            let mut request = self.client.post(&url).json(body);
            if let Some((name, value)) = self.auth_header() {
                request = request.header(name, value);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<R>()
                        .await
                        .map_err(|e| EngineError::DataShape(format!("malformed response body: {e}")));
                }
                Ok(response) if response.status().as_u16() == 429 => {
                    warn!("rate limited on attempt {attempt}, retrying");
                    last_err = Some(EngineError::Quota("rate limited".to_string()));
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    last_err = Some(EngineError::Transport(format!("HTTP {status}: {text}")));
                }
                Err(e) => {
                    last_err = Some(EngineError::Transport(e.to_string()));
                }
            }

            if attempt < self.config.max_retries {
                tokio::time::sleep(Duration::from_millis(200 * (attempt as u64 + 1))).await;
            }
        }

        Err(last_err.unwrap_or_else(|| EngineError::Transport("exhausted retries".into())))
    }
}

/// `JsonModelClient` implementation talking to an OpenAI-compatible
/// `/chat/completions` endpoint with JSON response-format mode.
pub struct HttpJsonModelClient {
    core: HttpCore,
}

impl HttpJsonModelClient {
    pub fn new(config: OpenAiCompatibleConfig, cache: Option<Arc<LlmCache>>) -> Self {
        Self {
            core: HttpCore::new(config, cache),
        }
    }
}

#[async_trait]
impl JsonModelClient for HttpJsonModelClient {
    async fn generate_json_value(&self, prompt: &str, schema: &Value) -> Result<Value> {
        let system_prompt = format!(
            "Respond with a single JSON object conforming exactly to this JSON Schema. \
             Do not include any text outside the JSON object.\n\nSchema:\n{schema}"
        );

        if let Some(cache) = &self.core.cache {
            let key = LlmCache::compute_cache_key(prompt, &self.core.config.chat_model, 0.0, 0, Some(&system_prompt));
            if let Ok(Some(cached)) = cache.get(&key).await {
                if let Ok(value) = serde_json::from_str::<Value>(&cached) {
                    return Ok(value);
                }
            }
        }

        let mut last_err = None;
        for attempt in 0..self.core.config.schema_retry_attempts {
            let request = ChatRequest {
                model: &self.core.config.chat_model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: system_prompt.clone(),
                    },
                    ChatMessage {
                        role: "user",
                        content: prompt.to_string(),
                    },
                ],
                response_format: ResponseFormat { kind: "json_object" },
                temperature: 0.0,
            };

            let response: ChatResponse = match self.core.post_json("chat/completions", &request).await {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };

            let Some(choice) = response.choices.into_iter().next() else {
                last_err = Some(EngineError::DataShape("no choices returned".into()));
                continue;
            };

            match serde_json::from_str::<Value>(&choice.message.content) {
                Ok(value) if validates_against_schema(&value, schema) => {
                    if let Some(cache) = &self.core.cache {
                        let key = LlmCache::compute_cache_key(
                            prompt,
                            &self.core.config.chat_model,
                            0.0,
                            0,
                            Some(&system_prompt),
                        );
                        let _ = cache.set(key, choice.message.content.clone(), self.core.config.chat_model.clone(), 0.0).await;
                    }
                    return Ok(value);
                }
                Ok(_) => {
                    debug!("schema validation failed on attempt {attempt}");
                    last_err = Some(EngineError::Schema("response did not match schema".into()));
                }
                Err(e) => {
                    last_err = Some(EngineError::DataShape(format!("model did not return valid JSON: {e}")));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| EngineError::Schema("schema validation exhausted retries".into())))
    }
}

/// `Embedder` implementation talking to an OpenAI-compatible
/// `/embeddings` endpoint.
pub struct HttpEmbedder {
    core: HttpCore,
    dim: usize,
}

impl HttpEmbedder {
    pub fn new(config: OpenAiCompatibleConfig, dim: usize) -> Self {
        Self {
            core: HttpCore::new(config, None),
            dim,
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: &self.core.config.embedding_model,
            input: text,
        };
        let response: EmbeddingResponse = self.core.post_json("embeddings", &request).await?;
        let datum = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::DataShape("embeddings response had no data".into()))?;
        Ok(Embedding::new(datum.embedding))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Minimal structural check: every `required` field named in a top-level
/// object schema is present. Full JSON-Schema validation is out of scope
/// (spec §9); this catches the common failure mode (missing field) that
/// drives the retry loop.
fn validates_against_schema(value: &Value, schema: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let Some(required) = schema.get("required").and_then(|r| r.as_array()) else {
        return true;
    };
    required.iter().all(|field| field.as_str().map(|f| obj.contains_key(f)).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_validation_checks_required_fields() {
        let schema = json!({"required": ["answer"]});
        assert!(validates_against_schema(&json!({"answer": true}), &schema));
        assert!(!validates_against_schema(&json!({"other": 1}), &schema));
    }
}
