use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// MIME type Drive uses for folder containers.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, parents)";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Lists one page of the direct children of a folder.
    pub async fn list_children(
        &self,
        folder_id: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let query = format!("'{folder_id}' in parents and trashed = false");
        self.list_files(&query, page_size, page_token).await
    }

    /// Lists one page of every folder-type entry in the store.
    pub async fn list_folders(
        &self,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let query = format!("mimeType='{FOLDER_MIME_TYPE}' and trashed = false");
        self.list_files(&query, page_size, page_token).await
    }

    async fn list_files(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            pairs.append_pair("spaces", "drive");
            pairs.append_pair("fields", LIST_FIELDS);
            pairs.append_pair("pageSize", &page_size.max(1).to_string());
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Starts a media download for a file and returns the raw response;
    /// the caller drains `bytes_stream` to wherever the bytes belong.
    pub async fn get_file_media(&self, file_id: &str) -> Result<reqwest::Response, DriveError> {
        let mut url = self.endpoint(&format!("/drive/v3/files/{file_id}"))?;
        url.query_pairs_mut().append_pair("alt", "media");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(DriveError::Api { status, body })
        }
    }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

/// One entry of a Drive `files.list` response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    Image,
    Other,
}

impl RemoteEntry {
    /// Every entry falls into exactly one kind.
    pub fn kind(&self) -> EntryKind {
        if self.mime_type == FOLDER_MIME_TYPE {
            EntryKind::Folder
        } else if self.mime_type.starts_with("image/") {
            EntryKind::Image
        } else {
            EntryKind::Other
        }
    }

    /// Root folders carry no parent reference.
    pub fn is_root_folder(&self) -> bool {
        self.kind() == EntryKind::Folder && self.parents.is_empty()
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<RemoteEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
