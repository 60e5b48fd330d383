//! Remote embedding adapters: Google Gemini, Hugging Face inference, and any
//! OpenAI-compatible `/v1/embeddings` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{check_shape, l2_normalize, EmbeddingBackend};
use crate::error::{RagError, Result};

#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    Google { model: String },
    HuggingFace { model_id: String },
    OpenAiCompatible { endpoint: String, model: String },
}

pub struct RemoteEmbedder {
    provider: EmbeddingProvider,
    api_key: String,
    dimension: usize,
    client: Client,
}

impl RemoteEmbedder {
    pub fn new(provider: EmbeddingProvider, api_key: String, dimension: usize) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| RagError::EmbeddingBackend(format!("http client: {}", e)))?;

        Ok(Self {
            provider,
            api_key,
            dimension,
            client,
        })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            EmbeddingProvider::Google { model } => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:batchEmbedContents",
                model
            ),
            EmbeddingProvider::HuggingFace { model_id } => format!(
                "https://api-inference.huggingface.co/pipeline/feature-extraction/{}",
                model_id
            ),
            EmbeddingProvider::OpenAiCompatible { endpoint, .. } => endpoint.clone(),
        }
    }

    /// Parse a response body as JSON, returning a clear error if the server
    /// returned HTML (e.g. a gateway error page) instead of valid JSON.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RagError::EmbeddingBackend(format!("failed to read body from {}: {}", endpoint, e))
        })?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(RagError::EmbeddingBackend(format!(
                "{} returned HTML instead of JSON (HTTP {}): {}",
                endpoint, status, preview
            )));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            RagError::EmbeddingBackend(format!(
                "failed to parse JSON from {} (HTTP {}): {}. Body: {}",
                endpoint, status, e, preview
            ))
        })
    }

    async fn embed_google(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Deserialize)]
        struct BatchResponse {
            embeddings: Vec<ValuesEntry>,
        }
        #[derive(Deserialize)]
        struct ValuesEntry {
            values: Vec<f32>,
        }

        let model = match &self.provider {
            EmbeddingProvider::Google { model } => model.clone(),
            _ => unreachable!(),
        };
        let requests: Vec<_> = texts
            .iter()
            .map(|t| {
                json!({
                    "model": format!("models/{}", model),
                    "content": { "parts": [{ "text": t }] }
                })
            })
            .collect();

        let endpoint = self.endpoint();
        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| RagError::EmbeddingBackend(format!("google request failed: {}", e)))?;

        let parsed: BatchResponse = Self::parse_json_response(response, &endpoint).await?;
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn embed_huggingface(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let endpoint = self.endpoint();
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "inputs": texts,
                "options": { "wait_for_model": true }
            }))
            .send()
            .await
            .map_err(|e| {
                RagError::EmbeddingBackend(format!("huggingface request failed: {}", e))
            })?;

        Self::parse_json_response::<Vec<Vec<f32>>>(response, &endpoint).await
    }

    async fn embed_openai_compatible(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        #[derive(Deserialize)]
        struct EmbeddingsResponse {
            data: Vec<EmbeddingEntry>,
        }
        #[derive(Deserialize)]
        struct EmbeddingEntry {
            index: usize,
            embedding: Vec<f32>,
        }

        let model = match &self.provider {
            EmbeddingProvider::OpenAiCompatible { model, .. } => model.clone(),
            _ => unreachable!(),
        };
        let endpoint = self.endpoint();
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": model, "input": texts }))
            .send()
            .await
            .map_err(|e| RagError::EmbeddingBackend(format!("embedding request failed: {}", e)))?;

        let mut parsed: EmbeddingsResponse = Self::parse_json_response(response, &endpoint).await?;
        // The API is allowed to reorder entries; restore input order.
        parsed.data.sort_by_key(|e| e.index);
        Ok(parsed.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingBackend for RemoteEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = match &self.provider {
            EmbeddingProvider::Google { .. } => self.embed_google(texts).await?,
            EmbeddingProvider::HuggingFace { .. } => self.embed_huggingface(texts).await?,
            EmbeddingProvider::OpenAiCompatible { .. } => {
                self.embed_openai_compatible(texts).await?
            }
        };

        check_shape(self.name(), texts.len(), self.dimension, &vectors)?;
        for v in &mut vectors {
            l2_normalize(v);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        match &self.provider {
            EmbeddingProvider::Google { .. } => "google-embeddings",
            EmbeddingProvider::HuggingFace { .. } => "huggingface-embeddings",
            EmbeddingProvider::OpenAiCompatible { .. } => "openai-compatible-embeddings",
        }
    }
}
