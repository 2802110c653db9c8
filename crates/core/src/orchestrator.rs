use crate::chat::ChatCompleter;
use crate::chunking::{chunk_text, truncate_chars, ChunkingConfig};
use crate::credentials::CredentialProvider;
use crate::embeddings::Embedder;
use crate::error::AgentError;
use crate::models::{ChatMessage, Chunk, IngestReport, StoreStats};
use crate::ranking::{rank, RankedChunk, DEFAULT_TOP_K};
use crate::store::{StoreBackend, VectorStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are an AI agent with access to notes the user has saved. Use the supplied context when it is relevant.";

/// Optional character budgets applied before text reaches a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncationPolicy {
    pub max_content_chars: Option<usize>,
    pub max_prompt_chars: Option<usize>,
}

impl TruncationPolicy {
    fn content(&self, text: &str) -> String {
        apply_budget(text, self.max_content_chars)
    }

    fn prompt(&self, text: &str) -> String {
        apply_budget(text, self.max_prompt_chars)
    }
}

fn apply_budget(text: &str, budget: Option<usize>) -> String {
    match budget {
        Some(max_chars) => truncate_chars(text, max_chars),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub truncation: TruncationPolicy,
    pub system_prompt: String,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
            truncation: TruncationPolicy::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

pub struct ContextAgent<E, C, P, B>
where
    E: Embedder,
    C: ChatCompleter,
    P: CredentialProvider,
    B: StoreBackend,
{
    embedder: E,
    chat: C,
    credentials: P,
    store: VectorStore<B>,
    options: AgentOptions,
}

impl<E, C, P, B> ContextAgent<E, C, P, B>
where
    E: Embedder + Send + Sync,
    C: ChatCompleter + Send + Sync,
    P: CredentialProvider + Send + Sync,
    B: StoreBackend + Send + Sync,
{
    pub fn new(embedder: E, chat: C, credentials: P, store: VectorStore<B>, options: AgentOptions) -> Self {
        Self {
            embedder,
            chat,
            credentials,
            store,
            options,
        }
    }

    pub fn store(&self) -> &VectorStore<B> {
        &self.store
    }

    pub fn credentials(&self) -> &P {
        &self.credentials
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Chunks, embeds and stores `text`.
    ///
    /// The store is written once per call. If an embedding fails part way,
    /// the segments embedded before it are still persisted in that single
    /// write and the error is returned: durable partial progress, reported as
    /// a failure. Persisting per segment would survive a crash mid-call too,
    /// at the cost of one full-store write per segment.
    pub async fn ingest(&self, text: &str, source: Option<&str>) -> Result<IngestReport, AgentError> {
        let credential = self.require_credential().await?;

        let segments = chunk_text(text, self.options.chunking);
        if segments.is_empty() {
            return Err(AgentError::EmptyInput);
        }

        let source = source
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .map(str::to_string);

        let mut tx = self.store.begin().await?;
        let mut entries = 0usize;
        let mut failure = None;

        for segment in &segments {
            let content = self.options.truncation.content(segment);
            match self.embedder.embed(&credential, &content).await {
                Ok(embedding) => {
                    tx.append(Chunk::embedded(content, source.clone(), embedding));
                    entries += 1;
                }
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        let evicted = tx.evicted();
        if let Some(error) = failure {
            warn!(
                indexed = entries,
                remaining = segments.len() - entries,
                error = %error,
                "ingest aborted by embedding failure"
            );
            // The embedding error is what the caller must act on.
            if entries > 0 {
                if let Err(commit_error) = tx.commit().await {
                    warn!(error = %commit_error, "partial ingest could not be persisted");
                }
            }
            return Err(error);
        }
        tx.commit().await?;

        info!(entries, evicted, source = source.as_deref().unwrap_or("unknown"), "ingested");
        Ok(IngestReport { entries, evicted })
    }

    /// Answers `prompt`, grounding it in the closest stored chunks.
    pub async fn answer(&self, prompt: &str) -> Result<String, AgentError> {
        let credential = self.require_credential().await?;

        if prompt.trim().is_empty() {
            return Err(AgentError::EmptyInput);
        }
        let prompt = self.options.truncation.prompt(prompt);

        let chunks = self.store.load().await?;
        let user_content = if chunks.is_empty() {
            debug!("store is empty, sending prompt without retrieval");
            prompt.clone()
        } else {
            let query = self.embedder.embed(&credential, &prompt).await?;
            let ranked = rank(&query, &chunks, self.options.top_k);
            debug!(candidates = chunks.len(), selected = ranked.len(), "retrieved context");
            assemble_user_content(&build_context_block(&ranked), &prompt)
        };

        let messages = [
            ChatMessage::system(self.options.system_prompt.clone()),
            ChatMessage::user(user_content),
        ];
        let text = self.chat.complete(&credential, &messages).await?;
        info!(chars = text.chars().count(), "answered");
        Ok(text)
    }

    pub async fn stats(&self) -> Result<StoreStats, AgentError> {
        self.store.stats().await
    }

    async fn require_credential(&self) -> Result<String, AgentError> {
        self.credentials.get().await?.ok_or(AgentError::NoCredential)
    }
}

pub fn build_context_block(ranked: &[RankedChunk<'_>]) -> String {
    ranked
        .iter()
        .map(|hit| format!("{}:\n{}", hit.chunk.source_label(), hit.chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn assemble_user_content(context: &str, prompt: &str) -> String {
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!("Context:\n{context}\n\nUser prompt:\n{prompt}")
    }
}
