use std::io;
use std::path::Path;

use drive_core::{OAuthClient, OAuthError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOKEN_ENV: &str = "DRIVE_MIRROR_TOKEN";
const CLIENT_ID_ENV: &str = "DRIVE_MIRROR_CLIENT_ID";
const CLIENT_SECRET_ENV: &str = "DRIVE_MIRROR_CLIENT_SECRET";

const REFRESH_SKEW_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no credentials: set {TOKEN_ENV} or provide a token file at {0}")]
    Missing(String),
    #[error("token file I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("token file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("stored token is expired and no refresh credentials are configured")]
    ExpiredWithoutRefresh,
    #[error("token refresh failed: {0}")]
    OAuth(#[from] OAuthError),
}

/// On-disk token shape. `expires_at` is a unix timestamp; a missing value
/// means the token is trusted as-is.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl StoredToken {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now.saturating_add(REFRESH_SKEW_SECS))
    }
}

/// Resolves a usable access token, refreshing and rewriting the token file
/// when the stored one has expired. Any failure here aborts the run.
pub async fn resolve_access_token(token_path: &Path) -> Result<String, TokenError> {
    if let Ok(token) = std::env::var(TOKEN_ENV)
        && !token.trim().is_empty()
    {
        return Ok(token);
    }
    resolve_from_file(token_path, oauth_client_from_env()?.as_ref()).await
}

pub async fn resolve_from_file(
    path: &Path,
    oauth: Option<&OAuthClient>,
) -> Result<String, TokenError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(TokenError::Missing(path.display().to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    let stored: StoredToken = serde_json::from_str(&raw)?;

    if !stored.is_expired(now_unix()) {
        return Ok(stored.access_token);
    }

    let refresh = stored
        .refresh_token
        .ok_or(TokenError::ExpiredWithoutRefresh)?;
    let oauth = oauth.ok_or(TokenError::ExpiredWithoutRefresh)?;
    let token = oauth.refresh_token(&refresh).await?;

    let refreshed = StoredToken {
        access_token: token.access_token,
        refresh_token: token.refresh_token.or(Some(refresh)),
        expires_at: token
            .expires_in
            .map(|secs| now_unix().saturating_add(secs as i64)),
    };
    std::fs::write(path, serde_json::to_string_pretty(&refreshed)?)?;
    Ok(refreshed.access_token)
}

fn oauth_client_from_env() -> Result<Option<OAuthClient>, TokenError> {
    let (Ok(id), Ok(secret)) = (
        std::env::var(CLIENT_ID_ENV),
        std::env::var(CLIENT_SECRET_ENV),
    ) else {
        return Ok(None);
    };
    Ok(Some(OAuthClient::new(id, secret)?))
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn uses_stored_token_when_not_expired() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("token.json");
        std::fs::write(
            &file,
            json!({ "access_token": "stored-access" }).to_string(),
        )
        .unwrap();

        let token = resolve_from_file(&file, None).await.unwrap();
        assert_eq!(token, "stored-access");
    }

    #[tokio::test]
    async fn refreshes_expired_token_and_rewrites_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let file = dir.path().join("token.json");
        std::fs::write(
            &file,
            json!({
                "access_token": "stale-access",
                "refresh_token": "refresh-1",
                "expires_at": 1
            })
            .to_string(),
        )
        .unwrap();

        let oauth = OAuthClient::with_base_url(&server.uri(), "id", "secret").unwrap();
        let token = resolve_from_file(&file, Some(&oauth)).await.unwrap();
        assert_eq!(token, "fresh-access");

        let rewritten: StoredToken =
            serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(rewritten.access_token, "fresh-access");
        assert_eq!(rewritten.refresh_token.as_deref(), Some("refresh-1"));
        assert!(rewritten.expires_at.unwrap() > 1);
    }

    #[tokio::test]
    async fn expired_token_without_refresh_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("token.json");
        std::fs::write(
            &file,
            json!({ "access_token": "stale", "expires_at": 1 }).to_string(),
        )
        .unwrap();

        let err = resolve_from_file(&file, None).await.unwrap_err();
        assert!(matches!(err, TokenError::ExpiredWithoutRefresh));
    }

    #[tokio::test]
    async fn missing_file_reports_missing_credentials() {
        let dir = tempdir().unwrap();
        let err = resolve_from_file(&dir.path().join("absent.json"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Missing(_)));
    }
}
