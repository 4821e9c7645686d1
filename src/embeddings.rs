//! Semantic embeddings for the local document index
//!
//! Local embedding model using ONNX Runtime. Chunks are embedded once at
//! ingestion and stored next to the chunk row; queries are embedded at search
//! time and compared with cosine similarity.
//!
//! Model: all-MiniLM-L6-v2 (22MB, 384 dimensions, runs on CPU)

use crate::error::{Result, ScoutError};
use ndarray::Array2;
use ort::{inputs, session::{Session, builder::GraphOptimizationLevel}, value::Tensor};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokenizers::Tokenizer;
use tracing::info;

/// Embedding dimensions for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Maximum sequence length for the model
const MAX_SEQ_LEN: usize = 256;

/// Turns text into a fixed-length, L2-normalized vector
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

fn embedding_error(e: impl std::fmt::Display) -> ScoutError {
    ScoutError::Embedding(e.to_string())
}

/// ONNX sentence-transformer embedder
///
/// The session is behind a mutex so one embedder can be shared by the
/// retrieval provider and document ingestion.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl OnnxEmbedder {
    /// Load the model from `model_dir`, downloading it first if missing
    pub fn new(model_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(model_dir)?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() || !tokenizer_path.exists() {
            Self::download_model(model_dir)?;
        }

        let session = Session::builder()
            .map_err(embedding_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(embedding_error)?
            .with_intra_threads(4)
            .map_err(embedding_error)?
            .commit_from_file(&model_path)
            .map_err(|e| ScoutError::Embedding(format!("Failed to load ONNX model: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ScoutError::Embedding(format!("Failed to load tokenizer: {}", e)))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    /// Download the embedding model from HuggingFace
    fn download_model(model_dir: &Path) -> Result<()> {
        use hf_hub::api::sync::Api;

        info!("Downloading embedding model (all-MiniLM-L6-v2)...");
        let api = Api::new().map_err(embedding_error)?;
        let repo = api.model("sentence-transformers/all-MiniLM-L6-v2".to_string());

        let model_path = repo.get("onnx/model.onnx").map_err(embedding_error)?;
        std::fs::copy(&model_path, model_dir.join("model.onnx"))?;

        let tokenizer_path = repo.get("tokenizer.json").map_err(embedding_error)?;
        std::fs::copy(&tokenizer_path, model_dir.join("tokenizer.json"))?;

        info!("Model downloaded to {}", model_dir.display());
        Ok(())
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ScoutError::Embedding(format!("Tokenization failed: {}", e)))?;

        let len = encoding.get_ids().len().min(MAX_SEQ_LEN);
        let ids: Vec<i64> = encoding.get_ids()[..len].iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding.get_attention_mask()[..len]
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = vec![0i64; len];

        // Batch size 1
        let input_ids = Array2::from_shape_vec((1, len), ids).map_err(embedding_error)?;
        let attention = Array2::from_shape_vec((1, len), attention_mask).map_err(embedding_error)?;
        let token_types = Array2::from_shape_vec((1, len), token_type_ids).map_err(embedding_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ScoutError::Embedding("embedding session poisoned".to_string()))?;

        let outputs = session
            .run(inputs![
                "input_ids" => Tensor::from_array(input_ids).map_err(embedding_error)?,
                "attention_mask" => Tensor::from_array(attention).map_err(embedding_error)?,
                "token_type_ids" => Tensor::from_array(token_types).map_err(embedding_error)?,
            ])
            .map_err(embedding_error)?;

        let output = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .ok_or_else(|| ScoutError::Embedding("No embedding output found".to_string()))?;

        // shape is [1, seq_len, embedding_dim]
        let (shape, data) = output.try_extract_tensor::<f32>().map_err(embedding_error)?;
        let shape_vec: Vec<i64> = shape.iter().copied().collect();
        let data_vec: Vec<f32> = data.to_vec();
        drop(outputs);

        Ok(l2_normalize(&mean_pool_flat(&data_vec, len, &shape_vec)))
    }
}

/// Mean pooling over the sequence dimension of a flat `[1, seq, dim]` tensor
pub(crate) fn mean_pool_flat(data: &[f32], seq_len: usize, shape: &[i64]) -> Vec<f32> {
    let mut result = vec![0.0f32; EMBEDDING_DIM];
    if seq_len == 0 {
        return result;
    }

    let embed_dim = if shape.len() >= 3 { shape[2] as usize } else { EMBEDDING_DIM };

    for i in 0..seq_len {
        for j in 0..embed_dim.min(EMBEDDING_DIM) {
            let idx = i * embed_dim + j;
            if idx < data.len() {
                result[j] += data[idx];
            }
        }
    }

    for v in result.iter_mut() {
        *v /= seq_len as f32;
    }

    result
}

/// L2 normalize a vector
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vec.iter().map(|x| x / norm).collect()
    } else {
        vec.to_vec()
    }
}

/// Cosine similarity between two vectors
///
/// Normalizes on the fly so stored vectors from any embedder compare safely.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Serialize an embedding as little-endian f32 bytes for a BLOB column
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn bytes_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Default model directory under the platform data dir
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scout")
        .join("models")
        .join("minilm")
}
