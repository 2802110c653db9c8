//! Request/response contract between external callers and the agent.

use crate::chat::ChatCompleter;
use crate::credentials::CredentialProvider;
use crate::embeddings::Embedder;
use crate::error::{AgentError, ErrorKind};
use crate::orchestrator::ContextAgent;
use crate::store::StoreBackend;
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentRequest {
    #[serde(rename_all = "camelCase")]
    SaveApiKey { api_key: String },
    LoadApiKey,
    IngestContent {
        content: String,
        #[serde(default)]
        source: Option<String>,
    },
    AgentChat { prompt: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum AgentResponse {
    #[serde(rename = "save-api-key:success")]
    SaveApiKey { ack: bool },
    #[serde(rename = "load-api-key:success")]
    LoadApiKey { value: String },
    #[serde(rename = "ingest-content:success")]
    IngestContent { entries: usize },
    #[serde(rename = "agent-chat:success")]
    AgentChat { text: String },
    #[serde(rename = "error")]
    Error { error: String, kind: ErrorKind },
}

impl AgentResponse {
    pub fn from_error(error: &AgentError) -> Self {
        Self::Error {
            error: error.to_string(),
            kind: error.kind(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl<E, C, P, B> ContextAgent<E, C, P, B>
where
    E: Embedder + Send + Sync,
    C: ChatCompleter + Send + Sync,
    P: CredentialProvider + Send + Sync,
    B: StoreBackend + Send + Sync,
{
    /// Runs one request. Every failure becomes an [`AgentResponse::Error`].
    pub async fn handle(&self, request: AgentRequest) -> AgentResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(failure) => AgentResponse::from_error(&failure),
        }
    }

    /// Decodes and runs one raw JSON request. Unknown request types are
    /// answered with an `invalid_request` error.
    pub async fn handle_json(&self, raw: &str) -> AgentResponse {
        match serde_json::from_str::<AgentRequest>(raw) {
            Ok(request) => self.handle(request).await,
            Err(decode_error) => {
                error!(error = %decode_error, "unrecognised request");
                AgentResponse::Error {
                    error: format!("unrecognised request: {decode_error}"),
                    kind: ErrorKind::InvalidRequest,
                }
            }
        }
    }

    async fn dispatch(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        match request {
            AgentRequest::SaveApiKey { api_key } => {
                self.credentials().set(api_key).await?;
                Ok(AgentResponse::SaveApiKey { ack: true })
            }
            AgentRequest::LoadApiKey => {
                let value = self.credentials().get().await?.unwrap_or_default();
                Ok(AgentResponse::LoadApiKey { value })
            }
            AgentRequest::IngestContent { content, source } => {
                let report = self.ingest(&content, source.as_deref()).await?;
                Ok(AgentResponse::IngestContent {
                    entries: report.entries,
                })
            }
            AgentRequest::AgentChat { prompt } => {
                let text = self.answer(&prompt).await?;
                Ok(AgentResponse::AgentChat { text })
            }
        }
    }
}
