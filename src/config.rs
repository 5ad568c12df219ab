//! Advisor Configuration
//!
//! Defaults, overridden by an optional JSON config file, then by
//! `POLICY_ADVISOR_*` environment variables, then by command-line flags.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::documents::chunker::{ChunkerConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::documents::embeddings::DEFAULT_EMBEDDING_MODEL;
use crate::llm::client::DEFAULT_OLLAMA_URL;
use crate::llm::summarizer::DEFAULT_CHAT_MODEL;
use crate::text::dedup::DEFAULT_THRESHOLD;

/// Name of the app directory under the platform data dir
const APP_DIR_NAME: &str = "policy-advisor";

/// Config file looked up in the data dir when none is given explicitly
pub const CONFIG_FILE: &str = "config.json";

pub const ENV_DATA_DIR: &str = "POLICY_ADVISOR_DATA_DIR";
pub const ENV_OLLAMA_URL: &str = "POLICY_ADVISOR_OLLAMA_URL";
pub const ENV_CHAT_MODEL: &str = "POLICY_ADVISOR_CHAT_MODEL";

/// Number of chunks retrieved per question
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("App data directory not found")]
    NoDataDir,
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Which embedder builds and queries the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Local feature hashing, no model server needed
    #[default]
    Hashing,
    /// Ollama embedding model
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvisorConfig {
    /// Root for the index, cached uploads and config; platform data dir if unset
    pub data_dir: Option<PathBuf>,
    /// Vector index directory; relative paths resolve under `data_dir`
    pub vectorstore_dir: PathBuf,
    /// Where ingested documents are copied; relative paths resolve under `data_dir`
    pub cached_docs_dir: PathBuf,
    pub ollama_url: String,
    pub chat_model: String,
    pub embedder: EmbedderKind,
    pub embedding_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub dedup_threshold: f64,
    pub request_timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            vectorstore_dir: PathBuf::from("vectorstore"),
            cached_docs_dir: PathBuf::from("cached_docs"),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedder: EmbedderKind::default(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            dedup_threshold: DEFAULT_THRESHOLD,
            request_timeout_secs: 120,
        }
    }
}

/// Platform data dir for the app (e.g. `~/.local/share/policy-advisor`)
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(base.join(APP_DIR_NAME))
}

impl AdvisorConfig {
    /// Resolve the full configuration.
    ///
    /// `config_path` must exist when given. Otherwise `<data dir>/config.json`
    /// is read if present. `data_dir` (from the command line) wins over both
    /// the file and the environment.
    pub fn load(config_path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let base = match data_dir.clone().or_else(|| std::env::var_os(ENV_DATA_DIR).map(PathBuf::from)) {
                    Some(dir) => dir,
                    None => default_data_dir()?,
                };
                let candidate = base.join(CONFIG_FILE);
                if candidate.is_file() {
                    Self::from_file(&candidate)?
                } else {
                    debug!(path = %candidate.display(), "No config file, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        if let Some(dir) = data_dir {
            config.data_dir = Some(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup(ENV_OLLAMA_URL).filter(|v| !v.is_empty()) {
            self.ollama_url = url;
        }
        if let Some(model) = lookup(ENV_CHAT_MODEL).filter(|v| !v.is_empty()) {
            self.chat_model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.dedup_threshold) {
            return Err(ConfigError::Invalid(format!(
                "dedupThreshold must be within [0, 1], got {}",
                self.dedup_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("topK must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("requestTimeoutSecs must be at least 1".to_string()));
        }
        self.chunker()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn vectorstore_dir(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.vectorstore_dir)
    }

    pub fn cached_docs_dir(&self) -> Result<PathBuf, ConfigError> {
        self.resolve(&self.cached_docs_dir)
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, ConfigError> {
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.data_dir()?.join(path))
        }
    }

    pub fn chunker(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
