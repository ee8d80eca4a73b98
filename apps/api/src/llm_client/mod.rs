//! Model client — the single point of entry for calls to the embedding and
//! text-generation backends.
//!
//! No other module may issue HTTP requests to a model backend directly.
//! Retrieval and parsing see only the `Embedder` and `Generator` traits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod embeddings;

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Response decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Model returned empty output")]
    EmptyOutput,

    #[error("Model returned {actual} results, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
}

// ────────────────────────────────────────────────────────────────────────────
// Shared HTTP transport
// ────────────────────────────────────────────────────────────────────────────

/// reqwest client shared by every model backend. Retries 429, 5xx and
/// connection failures with exponential backoff; other 4xx fail immediately.
#[derive(Clone)]
pub struct ModelTransport {
    client: Client,
    api_key: Option<String>,
}

impl ModelTransport {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, ModelError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_client(client: Client) -> Self {
        Self {
            client,
            api_key: None,
        }
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ModelError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut last_error: Option<ModelError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    url = %url,
                    "Model call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(url).json(body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ModelError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!(url = %url, "Model backend returned {}: {}", status, body);
                last_error = Some(ModelError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<BackendError>(&body)
                    .map(|e| e.error)
                    .unwrap_or(body);
                return Err(ModelError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let bytes = response.bytes().await?;
            debug!(url = %url, bytes = bytes.len(), "Model call succeeded");
            return Ok(serde_json::from_slice(&bytes)?);
        }

        Err(last_error.unwrap_or(ModelError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct BackendError {
    error: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Text generation
// ────────────────────────────────────────────────────────────────────────────

/// A free-text completion backend. No structural guarantee on the output.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    parameters: GenerationParameters,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// Endpoints answer either with one object or with a one-element list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Single(GeneratedText),
    Batch(Vec<GeneratedText>),
}

impl GenerationResponse {
    fn into_text(self) -> Option<String> {
        match self {
            GenerationResponse::Single(g) => Some(g.generated_text),
            GenerationResponse::Batch(batch) => {
                batch.into_iter().next().map(|g| g.generated_text)
            }
        }
    }
}

/// Generation backend reached over HTTP (`{"prompt", "parameters"}` → `generated_text`).
#[derive(Clone)]
pub struct HttpGenerator {
    transport: ModelTransport,
    url: String,
    parameters: GenerationParameters,
}

impl HttpGenerator {
    pub fn new(transport: ModelTransport, url: String, parameters: GenerationParameters) -> Self {
        Self {
            transport,
            url,
            parameters,
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let request = GenerationRequest {
            prompt,
            parameters: self.parameters,
        };
        let response: GenerationResponse = self.transport.post_json(&self.url, &request).await?;
        let text = response.into_text().ok_or(ModelError::EmptyOutput)?;
        debug!(chars = text.len(), "Generation completed");
        Ok(text)
    }
}
