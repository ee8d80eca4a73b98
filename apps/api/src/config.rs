use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::GenerationParameters;
use crate::retrieval::ChunkConfig;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub embedding_url: String,
    pub generation_url: String,
    pub model_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub pipeline: PipelineSettings,
}

/// Tunables for a single analysis request. Shared with handlers through `AppState`.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunk: ChunkConfig,
    pub top_k: usize,
    pub embed_batch_size: usize,
    pub query_cache_capacity: usize,
    pub pdf_workers: usize,
    pub max_upload_bytes: usize,
    /// Word cap on the retrieved context placed in the prompt. `None` = no cap.
    pub max_context_words: Option<usize>,
    pub generation: GenerationParameters,
    pub model_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            top_k: 5,
            embed_batch_size: 64,
            query_cache_capacity: 100,
            pdf_workers: 2,
            max_upload_bytes: 10 * 1024 * 1024,
            max_context_words: None,
            generation: GenerationParameters::default(),
            model_timeout: Duration::from_secs(120),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = PipelineSettings::default();

        let chunk = ChunkConfig::new(
            env_or("CHUNK_SIZE", defaults.chunk.size)?,
            env_or("CHUNK_OVERLAP", defaults.chunk.overlap)?,
        )
        .context("CHUNK_SIZE / CHUNK_OVERLAP are invalid")?;

        let pipeline = PipelineSettings {
            chunk,
            top_k: env_or("TOP_K", defaults.top_k)?,
            embed_batch_size: env_or("EMBED_BATCH_SIZE", defaults.embed_batch_size)?,
            query_cache_capacity: env_or("QUERY_CACHE_CAPACITY", defaults.query_cache_capacity)?,
            pdf_workers: env_or("PDF_WORKERS", defaults.pdf_workers)?,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            max_context_words: env_opt("MAX_CONTEXT_WORDS")?,
            generation: GenerationParameters {
                max_new_tokens: env_or("MAX_NEW_TOKENS", defaults.generation.max_new_tokens)?,
                temperature: env_or("TEMPERATURE", defaults.generation.temperature)?,
            },
            model_timeout: Duration::from_secs(env_or(
                "MODEL_TIMEOUT_SECS",
                defaults.model_timeout.as_secs(),
            )?),
        };

        Ok(Config {
            embedding_url: require_env("EMBEDDING_URL")?,
            generation_url: require_env("GENERATION_URL")?,
            model_api_key: std::env::var("MODEL_API_KEY").ok().filter(|k| !k.is_empty()),
            port: env_or("PORT", 8000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            pipeline,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(env_opt(key)?.unwrap_or(default))
}

fn env_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_settings() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.chunk, ChunkConfig { size: 300, overlap: 50 });
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.query_cache_capacity, 100);
        assert!(settings.max_context_words.is_none());
    }

    #[test]
    fn test_env_opt_parses_and_rejects() {
        std::env::set_var("RESUME_MATCHER_TEST_TOP_K", " 7 ");
        assert_eq!(env_opt::<usize>("RESUME_MATCHER_TEST_TOP_K").unwrap(), Some(7));

        std::env::set_var("RESUME_MATCHER_TEST_TOP_K", "seven");
        assert!(env_opt::<usize>("RESUME_MATCHER_TEST_TOP_K").is_err());

        std::env::remove_var("RESUME_MATCHER_TEST_TOP_K");
        assert_eq!(env_opt::<usize>("RESUME_MATCHER_TEST_TOP_K").unwrap(), None);
        assert_eq!(env_or("RESUME_MATCHER_TEST_TOP_K", 3usize).unwrap(), 3);
    }
}
