//! Remote generation adapters: Google Gemini, Groq, Hugging Face inference,
//! and any OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{GenerationBackend, GenerationConfig};
use crate::error::{RagError, Result};

#[derive(Debug, Clone)]
pub enum ApiProvider {
    Google,
    Groq,
    HuggingFace { model_id: String },
    Custom { endpoint: String },
}

pub struct RemoteProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    client: Client,
}

impl RemoteProvider {
    pub fn new(provider: ApiProvider, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(300))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RagError::GenerationBackend(format!("http client: {}", e)))?;

        tracing::info!(provider = ?provider, model = %model, "creating remote generation provider");

        Ok(Self {
            provider,
            api_key,
            model,
            client,
        })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            ApiProvider::Google => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            ),
            ApiProvider::Groq => "https://api.groq.com/openai/v1/chat/completions".to_string(),
            ApiProvider::HuggingFace { model_id } => {
                format!("https://api-inference.huggingface.co/models/{}", model_id)
            }
            ApiProvider::Custom { endpoint } => endpoint.clone(),
        }
    }

    /// Parse a response body as JSON, returning a clear error if the server
    /// returned HTML (e.g. a gateway error page) instead of valid JSON.
    async fn parse_json_response(response: reqwest::Response, endpoint: &str) -> Result<Value> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RagError::GenerationBackend(format!("failed to read body from {}: {}", endpoint, e))
        })?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(RagError::GenerationBackend(format!(
                "{} returned HTML instead of JSON (HTTP {}): {}",
                endpoint, status, preview
            )));
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            RagError::GenerationBackend(format!(
                "failed to parse JSON from {} (HTTP {}): {}. Body: {}",
                endpoint, status, e, preview
            ))
        })?;

        if !status.is_success() {
            return Err(RagError::GenerationBackend(format!(
                "{} returned HTTP {}: {}",
                endpoint,
                status,
                value
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
            )));
        }
        Ok(value)
    }

    async fn google_generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let endpoint = self.endpoint();
        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "maxOutputTokens": config.max_tokens,
                    "temperature": config.temperature,
                }
            }))
            .send()
            .await
            .map_err(|e| RagError::GenerationBackend(format!("google request failed: {}", e)))?;

        let value = Self::parse_json_response(response, &endpoint).await?;
        value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RagError::GenerationBackend("google response carried no candidate text".into())
            })
    }

    async fn openai_compatible_generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String> {
        let endpoint = self.endpoint();
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": config.max_tokens,
                "temperature": config.temperature,
            }))
            .send()
            .await
            .map_err(|e| RagError::GenerationBackend(format!("chat request failed: {}", e)))?;

        let value = Self::parse_json_response(response, &endpoint).await?;
        value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RagError::GenerationBackend("chat response carried no message content".into())
            })
    }

    async fn huggingface_generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String> {
        let endpoint = self.endpoint();
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "inputs": prompt,
                "parameters": {
                    "max_new_tokens": config.max_tokens,
                    "temperature": config.temperature,
                    "return_full_text": false,
                },
                "options": { "wait_for_model": true }
            }))
            .send()
            .await
            .map_err(|e| {
                RagError::GenerationBackend(format!("huggingface request failed: {}", e))
            })?;

        let value = Self::parse_json_response(response, &endpoint).await?;
        value
            .pointer("/0/generated_text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RagError::GenerationBackend("huggingface response carried no generated text".into())
            })
    }
}

#[async_trait]
impl GenerationBackend for RemoteProvider {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        match &self.provider {
            ApiProvider::Google => self.google_generate(prompt, config).await,
            ApiProvider::Groq | ApiProvider::Custom { .. } => {
                self.openai_compatible_generate(prompt, config).await
            }
            ApiProvider::HuggingFace { .. } => self.huggingface_generate(prompt, config).await,
        }
    }

    fn name(&self) -> &str {
        match &self.provider {
            ApiProvider::Google => "google",
            ApiProvider::Groq => "groq",
            ApiProvider::HuggingFace { .. } => "huggingface",
            ApiProvider::Custom { .. } => "custom",
        }
    }
}
