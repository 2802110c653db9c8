use async_trait::async_trait;
use context_agent_core::{AgentError, CredentialProvider, FileCredentials};

/// A key passed on the command line or through the environment wins over the
/// saved one. Saving always goes to the file.
pub struct EnvOverrideCredentials {
    override_key: Option<String>,
    saved: FileCredentials,
}

impl EnvOverrideCredentials {
    pub fn new(override_key: Option<String>, saved: FileCredentials) -> Self {
        Self {
            override_key: override_key.filter(|key| !key.trim().is_empty()),
            saved,
        }
    }
}

#[async_trait]
impl CredentialProvider for EnvOverrideCredentials {
    async fn get(&self) -> Result<Option<String>, AgentError> {
        match &self.override_key {
            Some(key) => Ok(Some(key.trim().to_string())),
            None => self.saved.get().await,
        }
    }

    async fn set(&self, secret: String) -> Result<(), AgentError> {
        self.saved.set(secret).await
    }
}
