use crate::chat::{OpenAiChat, DEFAULT_CHAT_MODEL};
use crate::chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embeddings::{OpenAiEmbedder, DEFAULT_EMBEDDING_MODEL, DEFAULT_PROVIDER_URL};
use crate::error::AgentError;
use crate::orchestrator::{AgentOptions, TruncationPolicy, DEFAULT_SYSTEM_PROMPT};
use crate::ranking::DEFAULT_TOP_K;
use crate::store::DEFAULT_STORE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Settings read from `config.toml`. Every field has a default, so an empty
/// file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub embedding: EmbeddingProvider,
    pub chat: ChatProvider,
    pub chunking: ChunkingSettings,
    pub store: StoreSettings,
    pub retrieval: RetrievalSettings,
    pub truncation: TruncationPolicy,
    pub request_timeout_secs: u64,
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingProvider {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatProvider {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingProvider::default(),
            chat: ChatProvider::default(),
            chunking: ChunkingSettings::default(),
            store: StoreSettings::default(),
            retrieval: RetrievalSettings::default(),
            truncation: TruncationPolicy::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl Default for ChatProvider {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_STORE_CAPACITY,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

impl AgentConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, AgentError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        ChunkingConfig::new(self.chunking.chunk_size, self.chunking.overlap)?;

        if self.store.capacity == 0 {
            return Err(AgentError::InvalidConfig(
                "store.capacity must be at least 1".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(AgentError::InvalidConfig(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        let providers = [
            ("embedding", &self.embedding.base_url, &self.embedding.model),
            ("chat", &self.chat.base_url, &self.chat.model),
        ];
        for (name, base_url, model) in providers {
            Url::parse(base_url).map_err(|error| {
                AgentError::InvalidConfig(format!("{name}.base_url: {error}"))
            })?;
            if model.trim().is_empty() {
                return Err(AgentError::InvalidConfig(format!("{name}.model is empty")));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn agent_options(&self) -> Result<AgentOptions, AgentError> {
        Ok(AgentOptions {
            chunking: ChunkingConfig::new(self.chunking.chunk_size, self.chunking.overlap)?,
            top_k: self.retrieval.top_k,
            truncation: self.truncation,
            system_prompt: self.system_prompt.clone(),
        })
    }

    pub fn embedder(&self) -> Result<OpenAiEmbedder, AgentError> {
        OpenAiEmbedder::new(
            &self.embedding.base_url,
            self.embedding.model.clone(),
            self.request_timeout(),
        )
    }

    pub fn chat_client(&self) -> Result<OpenAiChat, AgentError> {
        OpenAiChat::new(&self.chat.base_url, self.chat.model.clone(), self.request_timeout())
    }
}
