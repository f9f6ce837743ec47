//! Text generation: the [`TextGenerator`] seam and its Gemini implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use rivalscope_shared::{GeminiConfig, Result, RivalscopeError};

use crate::http::{build_client, check_status, endpoint};

const PROVIDER: &str = "gemini";

/// Given a prompt, return a free-text completion.
///
/// No schema is enforced on the returned text; callers parse it defensively.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types (generateContent)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

// ---------------------------------------------------------------------------
// GeminiGenerator
// ---------------------------------------------------------------------------

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    base_url: Url,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    /// Build a generator from the `[gemini]` config section and a resolved key.
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = endpoint(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", self.model),
        );
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RivalscopeError::Network(format!("{PROVIDER}: {e}")))?;
        let response = check_status(PROVIDER, response).await?;

        let body: GenerateResponse = response.json().await.map_err(|e| {
            RivalscopeError::provider(PROVIDER, format!("unreadable response body: {e}"))
        })?;

        if let Some(usage) = &body.usage_metadata {
            debug!(
                tokens_in = usage.prompt_token_count,
                tokens_out = usage.candidates_token_count,
                "generation complete"
            );
        }

        Ok(first_candidate_text(body))
    }
}

/// Concatenate the text parts of the first candidate.
///
/// A response without candidates (e.g. blocked by safety filters) yields an
/// empty string rather than an error.
fn first_candidate_text(body: GenerateResponse) -> String {
    body.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GeminiConfig {
        GeminiConfig {
            base_url: Url::parse(&server.uri()).unwrap(),
            model: "test-model".into(),
            ..GeminiConfig::default()
        }
    }

    #[test]
    fn request_serializes_as_single_user_turn() {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: "hi" }],
            }],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"contents":[{"role":"user","parts":[{"text":"hi"}]}]}"#);
    }

    #[test]
    fn empty_candidates_yield_empty_text() {
        let body: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(first_candidate_text(body), "");
    }

    #[tokio::test]
    async fn generate_joins_text_parts() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/test-model:generateContent"))
            .and(header("x-goog-api-key", "secret"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "plan please"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"parts": [{"text": "query one\n"}, {"text": "query two"}]}
                }],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 4}
            })))
            .mount(&server)
            .await;

        let generator = GeminiGenerator::new(&config_for(&server), "secret").unwrap();
        let text = generator.generate("plan please").await.unwrap();
        assert_eq!(text, "query one\nquery two");
        assert_eq!(generator.model(), "test-model");
    }

    #[tokio::test]
    async fn generate_surfaces_api_errors() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let generator = GeminiGenerator::new(&config_for(&server), "secret").unwrap();
        let err = generator.generate("anything").await.unwrap_err();
        match err {
            RivalscopeError::Provider { provider, message } => {
                assert_eq!(provider, "gemini");
                assert!(message.contains("429"));
                assert!(message.contains("quota exhausted"));
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }
}
