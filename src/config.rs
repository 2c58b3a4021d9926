//! User configuration and data directory resolution
//!
//! Everything verdigris persists lives under one data directory:
//! `$VERDIGRIS_HOME` if set, otherwise `~/.verdigris`. The embedding model
//! is selected in `config.toml`; a default config is written on first use.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Resolve the verdigris data directory
///
/// `$VERDIGRIS_HOME` overrides the default (`~/.verdigris`), which keeps
/// tests and multi-archive setups isolated from each other.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("VERDIGRIS_HOME") {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".verdigris"))
}

/// User configuration (from `{data_dir}/config.toml`)
#[derive(Debug, Deserialize)]
pub struct Config {
    pub embeddings: EmbeddingsConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingsConfig {
    /// Model directory name under `{data_dir}/models/`
    pub model: String,
    /// Embedding dimension (384 for all-MiniLM-L6-v2)
    pub dimensions: usize,
}

impl Config {
    /// Load user configuration, creating the default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = data_dir()?.join("config.toml");

        if !config_path.exists() {
            return Self::create_default();
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        toml::from_str(&content).context("Failed to parse config TOML")
    }

    /// Create default configuration
    fn create_default() -> Result<Self> {
        let dir = data_dir()?;
        std::fs::create_dir_all(&dir)?;

        let default_config = r#"# Verdigris User Configuration
[embeddings]
model = "all-minilm-l6-v2"
dimensions = 384
"#;

        std::fs::write(dir.join("config.toml"), default_config)?;

        Ok(Config {
            embeddings: EmbeddingsConfig {
                model: "all-minilm-l6-v2".to_string(),
                dimensions: 384,
            },
        })
    }

    /// Directory holding the configured model's `model.onnx` + `tokenizer.json`
    pub fn model_dir(&self) -> Result<PathBuf> {
        Ok(data_dir()?.join("models").join(&self.embeddings.model))
    }
}
