pub mod chat;
pub mod chunking;
pub mod config;
pub mod credentials;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod protocol;
pub mod ranking;
pub mod store;

pub use chat::{ChatCompleter, OpenAiChat, DEFAULT_CHAT_MODEL};
pub use chunking::{chunk_text, normalize_whitespace, truncate_chars, ChunkingConfig};
pub use config::AgentConfig;
pub use credentials::{CredentialProvider, FileCredentials, MemoryCredentials};
pub use embeddings::{Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use error::{AgentError, DimensionMismatch, ErrorKind};
pub use models::{ChatMessage, Chunk, IngestReport, Role, StoreStats};
pub use orchestrator::{AgentOptions, ContextAgent, TruncationPolicy};
pub use protocol::{AgentRequest, AgentResponse};
pub use ranking::{cosine_similarity, rank, RankedChunk, DEGENERATE_SIMILARITY};
pub use store::{FileBackend, MemoryBackend, StoreBackend, StoreTransaction, VectorStore};
