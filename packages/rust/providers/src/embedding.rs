//! Text embeddings: the [`Embedder`] seam and its Gemini implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use rivalscope_shared::{GeminiConfig, Result, RivalscopeError};

use crate::http::{build_client, check_status, endpoint};

const PROVIDER: &str = "gemini";

/// Upper bound on texts per `batchEmbedContents` call.
const MAX_BATCH: usize = 100;

/// Converts text into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier; persisted with an index so mismatches are caught on load.
    fn model(&self) -> &str;

    /// Embed every text, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

/// Gemini `batchEmbedContents` client.
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: Client,
    base_url: Url,
    model: String,
    api_key: String,
}

impl GeminiEmbedder {
    /// Build an embedder from the `[gemini]` config section and a resolved key.
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            model: config.embedding_model.clone(),
            api_key: api_key.into(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model_path = format!("models/{}", self.model);
        let request = BatchRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &model_path,
                    content: EmbedContent {
                        parts: vec![EmbedPart { text }],
                    },
                })
                .collect(),
        };

        let url = endpoint(
            &self.base_url,
            &format!("v1beta/models/{}:batchEmbedContents", self.model),
        );
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RivalscopeError::Network(format!("{PROVIDER}: {e}")))?;
        let response = check_status(PROVIDER, response).await?;

        let body: BatchResponse = response.json().await.map_err(|e| {
            RivalscopeError::provider(PROVIDER, format!("unreadable embedding response: {e}"))
        })?;

        if body.embeddings.len() != texts.len() {
            return Err(RivalscopeError::provider(
                PROVIDER,
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    body.embeddings.len()
                ),
            ));
        }

        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, texts = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            vectors.extend(self.embed_batch(batch).await?);
            debug!(done = vectors.len(), total = texts.len(), "embedded batch");
        }
        Ok(vectors)
    }
}
