//! Pluggable text generation. Concrete adapters live in `remote`; callers
//! usually wrap them in a `FallbackGenerator` so a flaky provider degrades
//! to the next one instead of failing the request.

pub mod remote;

pub use remote::{ApiProvider, RemoteProvider};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 256,
            temperature: 0.2,
        }
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    fn name(&self) -> &str;
}

/// Ordered chain of generation adapters. Any adapter failure is non-fatal
/// until all adapters are exhausted.
pub struct FallbackGenerator {
    providers: Vec<Box<dyn GenerationBackend>>,
}

impl FallbackGenerator {
    pub fn new(providers: Vec<Box<dyn GenerationBackend>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(RagError::GenerationBackend(
                "fallback chain needs at least one provider".into(),
            ));
        }
        Ok(Self { providers })
    }
}

#[async_trait]
impl GenerationBackend for FallbackGenerator {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let mut last_error = String::new();
        for provider in &self.providers {
            match provider.generate(prompt, config).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => {
                    tracing::warn!(provider = provider.name(), "provider returned empty text");
                    last_error = format!("{} returned empty text", provider.name());
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), "generation failed: {}", e);
                    last_error = e.to_string();
                }
            }
        }
        Err(RagError::GenerationBackend(format!(
            "all {} generation providers failed; last error: {}",
            self.providers.len(),
            last_error
        )))
    }

    fn name(&self) -> &str {
        "fallback-chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl GenerationBackend for Fixed {
        async fn generate(&self, _prompt: &str, _config: &GenerationConfig) -> Result<String> {
            self.reply
                .map(str::to_string)
                .ok_or_else(|| RagError::GenerationBackend("down".into()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn first_working_provider_wins() {
        let chain = FallbackGenerator::new(vec![
            Box::new(Fixed { reply: None }),
            Box::new(Fixed { reply: Some("from second") }),
            Box::new(Fixed { reply: Some("from third") }),
        ])
        .unwrap();
        let out = chain
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(out, "from second");
    }

    #[tokio::test]
    async fn empty_reply_counts_as_failure() {
        let chain = FallbackGenerator::new(vec![
            Box::new(Fixed { reply: Some("   ") }),
            Box::new(Fixed { reply: Some("real answer") }),
        ])
        .unwrap();
        let out = chain
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(out, "real answer");
    }

    #[tokio::test]
    async fn exhausted_chain_is_a_generation_error() {
        let chain = FallbackGenerator::new(vec![Box::new(Fixed { reply: None })]).unwrap();
        let err = chain
            .generate("p", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GenerationBackend(_)));
    }

    #[test]
    fn empty_chain_rejected() {
        assert!(FallbackGenerator::new(Vec::new()).is_err());
    }
}
