use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://oauth2.googleapis.com";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Self::with_base_url(DEFAULT_BASE_URL, client_id, client_secret)
    }

    pub fn with_base_url(
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthToken, OAuthError> {
        let url = self.base_url.join("/token")?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];

        let response = self.http.post(url).form(&form).send().await?;
        if response.status().is_success() {
            Ok(response.json::<OAuthToken>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(OAuthError::Api { status, body })
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}
