use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("no API credential configured")]
    NoCredential,

    #[error("nothing to ingest or ask: input is empty after normalization")]
    EmptyInput,

    #[error("{provider} request failed with status {status}: {body}")]
    Provider {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("invalid response from {provider}: {details}")]
    MalformedResponse { provider: String, details: String },

    #[error("chat provider returned no usable text")]
    EmptyCompletion,

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("stored snapshot version {found} is newer than supported version {supported}")]
    UnsupportedStoreVersion { found: u32, supported: u32 },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Coarse classification used at the invocation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoCredential,
    EmptyInput,
    Provider,
    MalformedResponse,
    EmptyCompletion,
    InvalidConfig,
    InvalidRequest,
    Storage,
    Transport,
}

impl ErrorKind {
    /// True when the user can fix the condition by changing input or configuration.
    pub fn is_user_correctable(self) -> bool {
        matches!(
            self,
            Self::NoCredential | Self::EmptyInput | Self::InvalidConfig | Self::InvalidRequest
        )
    }
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCredential => ErrorKind::NoCredential,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::EmptyCompletion => ErrorKind::EmptyCompletion,
            Self::InvalidChunkConfig(_) | Self::InvalidConfig(_) | Self::Url(_) | Self::Config(_) => {
                ErrorKind::InvalidConfig
            }
            Self::UnsupportedStoreVersion { .. } | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::Storage
            }
            Self::Http(_) => ErrorKind::Transport,
        }
    }

    /// HTTP status carried by a provider failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Raised when a query and a stored embedding differ in length. The ranker
/// drops the entry instead of surfacing this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dimension mismatch: query has {query} components, entry has {entry}")]
pub struct DimensionMismatch {
    pub query: usize,
    pub entry: usize,
}

pub type Result<T, E = AgentError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_is_user_correctable() {
        assert!(AgentError::NoCredential.kind().is_user_correctable());
        assert!(AgentError::EmptyInput.kind().is_user_correctable());
    }

    #[test]
    fn provider_failures_are_not_user_correctable() {
        let error = AgentError::Provider {
            provider: "embeddings".to_string(),
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::Provider);
        assert!(!error.kind().is_user_correctable());
        assert_eq!(error.status(), Some(503));
        assert_eq!(
            error.to_string(),
            "embeddings request failed with status 503: overloaded"
        );
    }
}
