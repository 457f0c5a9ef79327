use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};
use crate::provider::EmbeddingProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
pub const DEFAULT_MODEL: &str = "voyage-code-3";
pub const DEFAULT_INPUT_TYPE: &str = "document";

/// Voyage AI embeddings endpoint.
pub struct VoyageProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    input_type: String,
}

impl fmt::Debug for VoyageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoyageProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("input_type", &self.input_type)
            .finish()
    }
}

impl VoyageProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: Option<String>,
        mut base_url: String,
        model: String,
        input_type: String,
    ) -> Result<Self> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::default_client()?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url,
            model,
            input_type,
        })
    }

    /// Provider with the public endpoint and `voyage-code-3` document embeddings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_defaults(api_key: Option<String>) -> Result<Self> {
        Self::new(
            api_key,
            DEFAULT_BASE_URL.to_owned(),
            DEFAULT_MODEL.to_owned(),
            DEFAULT_INPUT_TYPE.to_owned(),
        )
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LlmError::Configuration("VOYAGE_API_KEY not set".into()))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl EmbeddingProvider for VoyageProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self.api_key()?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            input: texts,
            model: &self.model,
            input_type: &self.input_type,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(count = texts.len(), "Voyage embedding request rate limited");
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            tracing::error!("Voyage embedding API error {status}: {text}");
            return Err(LlmError::Api {
                provider: "voyage",
                status: status.as_u16(),
            });
        }

        let resp: EmbeddingResponse = serde_json::from_str(&text)?;
        if resp.data.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "voyage" });
        }

        let vectors = order_by_index(resp.data);
        if vectors.len() != texts.len() {
            return Err(LlmError::CountMismatch {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }

        tracing::debug!(
            count = vectors.len(),
            dimensions = vectors.first().map_or(0, Vec::len),
            "embedded batch"
        );
        Ok(vectors)
    }

    fn ensure_configured(&self) -> Result<()> {
        self.api_key().map(|_| ())
    }

    fn name(&self) -> &'static str {
        "voyage"
    }
}

/// Items without an `index` keep their response position.
fn order_by_index(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}
