use crate::error::AgentError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_PROVIDER_URL: &str = "https://api.openai.com";

const PROVIDER: &str = "embeddings";

#[async_trait]
pub trait Embedder {
    /// Embeds a single segment. One request, no retry.
    async fn embed(&self, credential: &str, text: &str) -> Result<Vec<f32>, AgentError>;
}

pub struct OpenAiEmbedder {
    endpoint: Url,
    model: String,
    client: Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: provider_endpoint(base_url, "embeddings")?,
            model: model.into(),
            client,
        })
    }
}

/// Builds `<base>/v1/<route>`. Any path prefix on `base_url` is kept and a
/// trailing `v1` segment is not repeated.
pub(crate) fn provider_endpoint(base_url: &str, route: &str) -> Result<Url, AgentError> {
    let mut endpoint = Url::parse(base_url)?;
    let path = endpoint.path().trim_end_matches('/').to_string();
    let prefix = path.strip_suffix("/v1").unwrap_or(path.as_str());
    endpoint.set_path(&format!("{prefix}/v1/{route}"));
    Ok(endpoint)
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, credential: &str, text: &str) -> Result<Vec<f32>, AgentError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(credential)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AgentError::Provider {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let payload: EmbeddingResponse =
            serde_json::from_str(&body).map_err(|error| AgentError::MalformedResponse {
                provider: PROVIDER.to_string(),
                details: error.to_string(),
            })?;

        let embedding = payload
            .data
            .into_iter()
            .next()
            .and_then(|datum| datum.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| AgentError::MalformedResponse {
                provider: PROVIDER.to_string(),
                details: "response carries no embedding vector".to_string(),
            })?;

        debug!(model = %self.model, dimensions = embedding.len(), "embedded segment");
        Ok(embedding)
    }
}
