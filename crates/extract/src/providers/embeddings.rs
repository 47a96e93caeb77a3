use crate::error::{ErrorKind, Result};
use crate::mode::keys;
use crate::models::Produced;
use crate::provider::{Input, Provider};
use crate::providers::TEXT_MEDIA_TYPES;
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

/// Inputs are cut to roughly what fits in a small embedding model's context.
const MAX_INPUT_CHARS: usize = 8000;

/// Connection settings for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

/// Text embeddings from a remote service.
///
/// Enrichment only: unavailable without an API key, and its failures never
/// fail an extraction.
#[derive(Debug, Clone)]
pub struct HttpEmbeddings {
    client: Client,
    settings: EmbeddingSettings,
}

impl HttpEmbeddings {
    pub fn new(settings: EmbeddingSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .or_raise(|| ErrorKind::Unavailable("failed to build HTTP client".to_string()))?;
        Ok(Self { client, settings })
    }

    async fn embed(&self, text: &str, api_key: &str) -> Result<Vec<f64>> {
        let request = EmbeddingRequest {
            model: &self.settings.model,
            input: text,
        };
        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .or_raise(|| ErrorKind::Remote(format!("request to {} failed", self.settings.endpoint)))?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Remote(format!("{} answered {status}", self.settings.endpoint)));
        }
        let body: EmbeddingResponse = response
            .json()
            .await
            .or_raise(|| ErrorKind::Remote("unexpected embedding response".to_string()))?;
        match body.data.into_iter().next() {
            Some(data) if !data.embedding.is_empty() => Ok(data.embedding),
            _ => exn::bail!(ErrorKind::Remote("embedding response had no vectors".to_string())),
        }
    }
}

#[async_trait]
impl Provider for HttpEmbeddings {
    fn name(&self) -> &str {
        "http-embeddings"
    }

    fn media_types(&self) -> &[&str] {
        TEXT_MEDIA_TYPES
    }

    fn keys(&self) -> &[&str] {
        &[keys::TEXT_EMBEDDING]
    }

    fn is_available(&self) -> bool {
        self.settings.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    fn is_enrichment(&self) -> bool {
        true
    }

    #[instrument(level = "debug", skip_all, fields(model = %self.settings.model))]
    async fn extract(&self, input: &Input) -> Result<Vec<Produced>> {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            exn::bail!(ErrorKind::Unavailable("no API key configured".to_string()));
        };
        let text = input.text();
        let text = match text.char_indices().nth(MAX_INPUT_CHARS) {
            Some((cut, _)) => &text[..cut],
            None => text.as_str(),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embed(text, api_key).await?;
        let dimensions = embedding.len();
        Ok(vec![
            Produced::new(keys::TEXT_EMBEDDING, serde_json::json!(embedding))
                .with_metadata("model", self.settings.model.clone())
                .with_metadata("dimensions", dimensions.to_string()),
        ])
    }
}
