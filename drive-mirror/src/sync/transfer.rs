use std::io;
use std::path::Path;

use drive_core::{DriveClient, DriveError};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("drive error: {0}")]
    Drive(#[from] DriveError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Streams file media from the remote store onto local disk.
#[derive(Clone)]
pub struct Downloader {
    client: DriveClient,
}

impl Downloader {
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    /// Downloads a file's bytes to `target`, creating the destination
    /// directory first. The write goes straight to the final path; an
    /// interrupted transfer can leave a partial file behind (best effort,
    /// matching the append-only log's record of the failure).
    pub async fn download(&self, file_id: &str, target: &Path) -> Result<(), TransferError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let response = self.client.get_file_media(file_id).await?;
        let mut file = tokio::fs::File::create(target).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(DriveError::from)?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn downloads_media_into_nested_directory() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/img-1"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pixels"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let target = dir.path().join("Laptop/Photos/a.jpg");
        let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();

        Downloader::new(client)
            .download("img-1", &target)
            .await
            .unwrap();

        assert_eq!(std::fs::read(target).unwrap(), b"pixels");
    }

    #[tokio::test]
    async fn api_failure_creates_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/img-404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let target = dir.path().join("missing.jpg");
        let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();

        let err = Downloader::new(client)
            .download("img-404", &target)
            .await
            .expect_err("expected download error");

        assert!(matches!(err, TransferError::Drive(_)));
        assert!(!target.exists());
    }
}
