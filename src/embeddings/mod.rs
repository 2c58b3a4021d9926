//! Embeddings module - Generate semantic embeddings for text
//!
//! Provides trait-based abstraction for embedding generation with ONNX
//! backend, plus a process-resident embedder shared across queries so the
//! model load cost is paid once per process.

mod onnx;
mod similarity;

pub use onnx::OnnxEmbedder;
pub use similarity::cosine_similarity;

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

use crate::config::Config;

/// Trait for embedding generation engines
///
/// Requires Send for use across parallel concept queries (rayon).
pub trait EmbeddingEngine: Send {
    /// Generate embedding for a single text
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (batch processing)
    fn embed_batch(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Get embedding dimension (e.g., 384 for all-MiniLM-L6-v2)
    fn dimension(&self) -> usize;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// Shared handle to an embedding engine
///
/// The mutex serializes embedding calls; the engine holds no other shared
/// state, so no further locking discipline is needed.
pub type SharedEmbedder = Arc<Mutex<Box<dyn EmbeddingEngine>>>;

static RESIDENT: OnceLock<SharedEmbedder> = OnceLock::new();

/// Factory function to create embedder from configuration
///
/// Reads model selection from the user config and loads the ONNX model
/// from `{data_dir}/models/{model}/`.
pub fn create_embedder() -> Result<Box<dyn EmbeddingEngine>> {
    let config = Config::load()?;
    let model_dir = config.model_dir()?;

    let embedder = OnnxEmbedder::new_from_paths(
        &model_dir.join("model.onnx"),
        &model_dir.join("tokenizer.json"),
        &config.embeddings.model,
        config.embeddings.dimensions,
    )?;

    Ok(Box::new(embedder))
}

/// Process-resident embedder, lazily initialized on first use
///
/// Initialization is idempotent: repeated calls return the same handle.
/// The model stays loaded for the lifetime of the process; there is no
/// teardown. If two threads race the first call, one model is constructed
/// and dropped - harmless, since construction has no side effects.
pub fn resident() -> Result<SharedEmbedder> {
    if let Some(cell) = RESIDENT.get() {
        return Ok(cell.clone());
    }

    let embedder = create_embedder()?;
    Ok(RESIDENT
        .get_or_init(|| Arc::new(Mutex::new(embedder)))
        .clone())
}

/// Wrap any engine (e.g., a test double) in a shared handle
pub fn shared(engine: Box<dyn EmbeddingEngine>) -> SharedEmbedder {
    Arc::new(Mutex::new(engine))
}
