use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::llm_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Which embedder backs the portfolio index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// Local all-MiniLM-L6-v2 sentence transformer run through ONNX Runtime.
    Onnx,
    /// OpenAI-compatible `/embeddings` endpoint.
    Http,
}

impl FromStr for EmbeddingBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "http" => Ok(Self::Http),
            other => bail!("EMBEDDING_BACKEND must be 'onnx' or 'http', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub llm_max_attempts: u32,
    pub llm_retry_backoff_ms: u64,
    pub portfolio_csv: PathBuf,
    pub vectorstore_path: PathBuf,
    pub embedding_backend: EmbeddingBackend,
    pub onnx_model_path: PathBuf,
    pub onnx_tokenizer_path: PathBuf,
    pub embedding_timeout_secs: u64,
    pub embedding_api_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub fetch_timeout_secs: u64,
    pub fetch_max_chars: Option<usize>,
    pub fetch_allow_private: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_base_url: env_or("LLM_BASE_URL", DEFAULT_BASE_URL),
            llm_model: env_or("LLM_MODEL", DEFAULT_MODEL),
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 120)?,
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS", 1)?,
            llm_retry_backoff_ms: parse_env("LLM_RETRY_BACKOFF_MS", 1000)?,
            portfolio_csv: env_or("PORTFOLIO_CSV", "my_portfolio.csv").into(),
            vectorstore_path: env_or("VECTORSTORE_PATH", "vectorstore/portfolio.json").into(),
            embedding_backend: parse_env("EMBEDDING_BACKEND", EmbeddingBackend::Onnx)?,
            onnx_model_path: env_or("ONNX_MODEL_PATH", "models/all-MiniLM-L6-v2/model.onnx").into(),
            onnx_tokenizer_path: env_or(
                "ONNX_TOKENIZER_PATH",
                "models/all-MiniLM-L6-v2/tokenizer.json",
            )
            .into(),
            embedding_timeout_secs: parse_env("EMBEDDING_TIMEOUT_SECS", 30)?,
            embedding_api_url: env_or(
                "EMBEDDING_API_URL",
                "https://api.openai.com/v1/embeddings",
            ),
            embedding_model: env_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            fetch_timeout_secs: parse_env("FETCH_TIMEOUT_SECS", 30)?,
            fetch_max_chars: std::env::var("FETCH_MAX_CHARS")
                .ok()
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("FETCH_MAX_CHARS must be a positive integer")?,
            fetch_allow_private: parse_env("FETCH_ALLOW_PRIVATE", false)?,
            port: parse_env("PORT", 5000)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}
