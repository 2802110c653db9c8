use crate::embeddings::provider_endpoint;
use crate::error::AgentError;
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

const PROVIDER: &str = "chat";

#[async_trait]
pub trait ChatCompleter {
    async fn complete(
        &self,
        credential: &str,
        messages: &[ChatMessage],
    ) -> Result<String, AgentError>;
}

pub struct OpenAiChat {
    endpoint: Url,
    model: String,
    client: Client,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: provider_endpoint(base_url, "chat/completions")?,
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl ChatCompleter for OpenAiChat {
    async fn complete(
        &self,
        credential: &str,
        messages: &[ChatMessage],
    ) -> Result<String, AgentError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(credential)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
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

        let payload: CompletionResponse =
            serde_json::from_str(&body).map_err(|error| AgentError::MalformedResponse {
                provider: PROVIDER.to_string(),
                details: error.to_string(),
            })?;

        let text = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(AgentError::EmptyCompletion)?;

        debug!(model = %self.model, chars = text.chars().count(), "chat completion received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat(server: &MockServer) -> OpenAiChat {
        OpenAiChat::new(&server.uri(), "chat-model", Duration::from_secs(5)).expect("chat builds")
    }

    #[tokio::test]
    async fn sends_messages_and_trims_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(json!({
                "model": "chat-model",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  hi there \n"}}]
            })))
            .mount(&server)
            .await;

        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hello")];
        let reply = chat(&server)
            .complete("sk-test", &messages)
            .await
            .expect("completion succeeds");
        assert_eq!(reply, "hi there");
    }

    #[tokio::test]
    async fn versioned_base_url_is_not_doubled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/v1/", server.uri());
        let chat = OpenAiChat::new(&base, "chat-model", Duration::from_secs(5)).expect("chat builds");
        let reply = chat
            .complete("sk", &[ChatMessage::user("hello")])
            .await
            .expect("completion succeeds");
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn blank_content_is_an_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "   "}}]
            })))
            .mount(&server)
            .await;

        let error = chat(&server)
            .complete("sk", &[ChatMessage::user("hello")])
            .await
            .expect_err("blank reply");
        assert!(matches!(error, AgentError::EmptyCompletion));
    }

    #[tokio::test]
    async fn missing_choices_is_an_empty_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let error = chat(&server)
            .complete("sk", &[ChatMessage::user("hello")])
            .await
            .expect_err("no choices");
        assert!(matches!(error, AgentError::EmptyCompletion));
    }

    #[tokio::test]
    async fn server_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let error = chat(&server)
            .complete("sk", &[ChatMessage::user("hello")])
            .await
            .expect_err("500 must fail");
        assert_eq!(error.status(), Some(500));
        assert!(error.to_string().contains("upstream down"));
    }
}
