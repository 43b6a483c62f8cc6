// Client for the upload server that holds post image artifacts.
// Database rows are the source of truth; artifact removal is best-effort
// and an orphaned file is left for the upload server's own garbage
// collection.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload server request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Upload server returned status {0}")]
    Status(u16),
}

/// Seam for the external file-storage service. Production uses the HTTP
/// client below; tests substitute fakes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn delete_artifact(&self, filename: &str, bearer_token: &str)
        -> Result<(), StorageError>;
}

pub struct HttpArtifactStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpArtifactStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn delete_artifact(
        &self,
        filename: &str,
        bearer_token: &str,
    ) -> Result<(), StorageError> {
        let url = format!("{}/delete/{}", self.base_url.trim_end_matches('/'), filename);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(bearer_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StorageError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
