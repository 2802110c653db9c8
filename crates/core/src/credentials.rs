use crate::error::AgentError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Holds the single opaque API secret. Blank secrets read as absent.
#[async_trait]
pub trait CredentialProvider {
    async fn get(&self) -> Result<Option<String>, AgentError>;

    async fn set(&self, secret: String) -> Result<(), AgentError>;
}

fn non_blank(secret: String) -> Option<String> {
    let trimmed = secret.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Default)]
pub struct MemoryCredentials {
    secret: RwLock<Option<String>>,
}

impl MemoryCredentials {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: RwLock::new(secret),
        }
    }
}

#[async_trait]
impl CredentialProvider for MemoryCredentials {
    async fn get(&self) -> Result<Option<String>, AgentError> {
        Ok(self.secret.read().await.clone().and_then(non_blank))
    }

    async fn set(&self, secret: String) -> Result<(), AgentError> {
        *self.secret.write().await = Some(secret);
        Ok(())
    }
}

/// Keeps the secret in a single file.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialProvider for FileCredentials {
    async fn get(&self) -> Result<Option<String>, AgentError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(secret) => Ok(non_blank(secret)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn set(&self, secret: String) -> Result<(), AgentError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(&self.path).await?;

        // `mode` does not apply to a file that already exists.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
        }

        file.write_all(secret.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn blank_secret_reads_as_absent() -> Result<(), AgentError> {
        let credentials = MemoryCredentials::default();
        assert_eq!(credentials.get().await?, None);

        credentials.set(String::new()).await?;
        assert_eq!(credentials.get().await?, None);

        credentials.set("  sk-live \n".to_string()).await?;
        assert_eq!(credentials.get().await?.as_deref(), Some("sk-live"));
        Ok(())
    }

    #[tokio::test]
    async fn file_credentials_survive_reopen() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("api_key");

        let credentials = FileCredentials::new(&path);
        assert_eq!(credentials.get().await?, None);
        credentials.set("sk-file".to_string()).await?;

        let reopened = FileCredentials::new(&path);
        assert_eq!(reopened.get().await?.as_deref(), Some("sk-file"));
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn key_file_is_owner_only() -> Result<(), Box<dyn std::error::Error>> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir()?;
        let path = dir.path().join("api_key");
        std::fs::write(&path, "old")?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))?;

        FileCredentials::new(&path).set("sk-secret".to_string()).await?;

        let mode = std::fs::metadata(&path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path)?, "sk-secret");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn new_key_file_is_created_owner_only() -> Result<(), Box<dyn std::error::Error>> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir()?;
        let path = dir.path().join("fresh_key");

        FileCredentials::new(&path).set("sk-new".to_string()).await?;

        let mode = std::fs::metadata(&path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }
}
