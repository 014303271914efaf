//! Text embedders backing the portfolio index.
//!
//! `OnnxEmbedder` is the default: the all-MiniLM-L6-v2 sentence transformer run
//! locally through ONNX Runtime. `HttpEmbedder` calls an OpenAI-compatible
//! `/embeddings` endpoint instead.

use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ndarray::{Array2, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

pub const MINILM_MODEL_NAME: &str = "all-MiniLM-L6-v2";
pub const MINILM_DIMENSIONS: usize = 384;
const MINILM_MAX_TOKENS: usize = 256;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Embedding API returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding model file not found: {0}")]
    ModelFile(String),

    #[error("Embedding model error: {0}")]
    Model(String),
}

fn model_err(e: impl Display) -> EmbedError {
    EmbedError::Model(e.to_string())
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier recorded in index snapshots. Vectors from embedders with
    /// different ids are not comparable.
    fn id(&self) -> String;

    /// Embeds each input text, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Sentence-transformer embedder over an exported ONNX model and its
/// `tokenizer.json`. Outputs are mean-pooled over non-padding tokens and
/// L2-normalised.
#[derive(Clone)]
pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    name: String,
}

impl OnnxEmbedder {
    pub fn new(
        name: impl Into<String>,
        model_path: &Path,
        tokenizer_path: &Path,
    ) -> Result<Self, EmbedError> {
        for path in [model_path, tokenizer_path] {
            if !path.exists() {
                return Err(EmbedError::ModelFile(path.display().to_string()));
            }
        }

        let session = Session::builder()
            .map_err(model_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_err)?
            .with_intra_threads(4)
            .map_err(model_err)?
            .commit_from_file(model_path)
            .map_err(model_err)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(model_err)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MINILM_MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(model_err)?;

        let name = name.into();
        info!("Loaded ONNX embedding model {name} from {}", model_path.display());
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            name,
        })
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn id(&self) -> String {
        format!("onnx-{}", self.name)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.session.clone();
        let tokenizer = self.tokenizer.clone();
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || embed_batch(&session, &tokenizer, texts))
            .await
            .map_err(model_err)?
    }
}

/// Tokenizes, pads to the longest input, runs one inference and mean-pools each row.
fn embed_batch(
    session: &Mutex<Session>,
    tokenizer: &Tokenizer,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>, EmbedError> {
    let batch = texts.len();
    let encodings = tokenizer.encode_batch(texts, true).map_err(model_err)?;
    let max_len = encodings
        .iter()
        .map(|enc| enc.get_ids().len())
        .max()
        .unwrap_or(0);

    let mut input_ids = Vec::with_capacity(batch * max_len);
    let mut attention_mask = Vec::with_capacity(batch * max_len);
    for encoding in &encodings {
        let ids = encoding.get_ids();
        let padding = max_len - ids.len();
        input_ids.extend(ids.iter().map(|&id| i64::from(id)));
        input_ids.extend(std::iter::repeat(0i64).take(padding));
        attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| i64::from(m)));
        attention_mask.extend(std::iter::repeat(0i64).take(padding));
    }
    let token_type_ids = vec![0i64; batch * max_len];

    let input_ids_array =
        Array2::from_shape_vec((batch, max_len), input_ids).map_err(model_err)?;
    let attention_mask_array =
        Array2::from_shape_vec((batch, max_len), attention_mask.clone()).map_err(model_err)?;
    let token_type_ids_array =
        Array2::from_shape_vec((batch, max_len), token_type_ids).map_err(model_err)?;

    let mut session = session
        .lock()
        .map_err(|_| EmbedError::Model("ONNX session lock poisoned".to_string()))?;
    let outputs = session
        .run(ort::inputs![
            "input_ids" => Value::from_array(input_ids_array).map_err(model_err)?,
            "attention_mask" => Value::from_array(attention_mask_array).map_err(model_err)?,
            "token_type_ids" => Value::from_array(token_type_ids_array).map_err(model_err)?
        ])
        .map_err(model_err)?;

    // Token-level output: [batch, seq_len, hidden]
    let hidden_states = outputs[0].try_extract_array::<f32>().map_err(model_err)?;
    let shape = hidden_states.shape().to_vec();
    if shape.len() != 3 || shape[0] != batch || shape[2] != MINILM_DIMENSIONS {
        return Err(EmbedError::Model(format!(
            "unexpected output shape {shape:?}, expected [{batch}, seq_len, {MINILM_DIMENSIONS}]"
        )));
    }

    let mut vectors = Vec::with_capacity(batch);
    for b in 0..batch {
        let item = hidden_states.index_axis(Axis(0), b);
        let mask = &attention_mask[b * max_len..(b + 1) * max_len];
        let mut pooled = vec![0.0f32; MINILM_DIMENSIONS];
        let mut tokens = 0.0f32;
        for (t, &m) in mask.iter().enumerate().take(shape[1]) {
            if m == 0 {
                continue;
            }
            tokens += 1.0;
            for (j, value) in pooled.iter_mut().enumerate() {
                *value += item[[t, j]];
            }
        }
        pooled.iter_mut().for_each(|v| *v /= tokens.max(1e-9));
        normalize(&mut pooled);
        vectors.push(pooled);
    }

    debug!("Embedded {batch} texts (padded to {max_len} tokens)");
    Ok(vectors)
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings endpoint.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(
        url: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url,
            model,
            api_key,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn id(&self) -> String {
        format!("http-{}", self.model)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.url).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut body: EmbeddingResponse = response.json().await?;
        if body.data.len() != texts.len() {
            return Err(EmbedError::CountMismatch {
                expected: texts.len(),
                actual: body.data.len(),
            });
        }
        body.data.sort_by_key(|d| d.index);

        debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}
