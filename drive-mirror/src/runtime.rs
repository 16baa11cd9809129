use anyhow::Context;
use drive_core::DriveClient;

use crate::config::MirrorConfig;
use crate::logbook::ProgressLog;
use crate::sync::reconciler::FolderReconciler;
use crate::sync::roots::list_root_folders;
use crate::sync::scheduler::BatchScheduler;
use crate::token;

#[derive(Debug)]
pub struct MirrorRuntime {
    config: MirrorConfig,
    client: DriveClient,
    log: ProgressLog,
}

impl MirrorRuntime {
    /// Resolves credentials and prepares the mirror base directory. Failure
    /// here is fatal; everything after bootstrap is caught and logged.
    pub async fn bootstrap(config: MirrorConfig) -> anyhow::Result<Self> {
        let token = token::resolve_access_token(&config.token_path)
            .await
            .context("authentication failed")?;
        let client = DriveClient::new(token)?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: MirrorConfig, client: DriveClient) -> Self {
        let log = ProgressLog::new(config.log_path.clone());
        Self {
            config,
            client,
            log,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.config.local_base)
            .await
            .with_context(|| {
                format!(
                    "failed to create mirror base at {:?}",
                    self.config.local_base
                )
            })?;
        self.log.append(&format!(
            "mirror started: base={}, parallelism={}, passes={}",
            self.config.local_base.display(),
            self.config.parallelism,
            self.config.policy.max_passes
        ));

        let roots =
            list_root_folders(&self.client, &self.log, self.config.policy.page_size).await;
        if roots.is_empty() {
            self.log.append("no root folders found; nothing to mirror");
            return Ok(());
        }

        let reconciler = FolderReconciler::new(
            self.client.clone(),
            self.log.clone(),
            self.config.policy.clone(),
        );
        let scheduler = BatchScheduler::new(
            reconciler,
            self.log.clone(),
            self.config.parallelism,
            self.config.per_batch_timeout,
        );
        scheduler.run_all(roots, &self.config.local_base).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcilePolicy;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(base: &std::path::Path) -> MirrorConfig {
        MirrorConfig {
            local_base: base.join("mirror"),
            log_path: base.join("progress.log"),
            token_path: base.join("token.json"),
            parallelism: 2,
            per_batch_timeout: Duration::from_secs(30),
            policy: ReconcilePolicy {
                inter_pass_delay: Duration::ZERO,
                resize_images: false,
                ..ReconcilePolicy::default()
            },
        }
    }

    #[tokio::test]
    async fn run_mirrors_discovered_roots_end_to_end() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param(
                "q",
                "mimeType='application/vnd.google-apps.folder' and trashed = false",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{
                    "id": "root-1",
                    "name": "Laptop",
                    "mimeType": "application/vnd.google-apps.folder"
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(query_param("q", "'root-1' in parents and trashed = false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "files": [{ "id": "img-1", "name": "shot.jpg", "mimeType": "image/jpeg" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files/img-1"))
            .and(query_param("alt", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"shot-bytes"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();

        MirrorRuntime::with_client(config.clone(), client)
            .run()
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(config.local_base.join("Laptop/shot.jpg")).unwrap(),
            b"shot-bytes"
        );
        let logged = std::fs::read_to_string(&config.log_path).unwrap();
        assert!(logged.contains("found 1 root folders"));
        assert!(logged.contains("all batches completed"));
    }

    #[tokio::test]
    async fn run_exits_cleanly_when_no_roots_exist() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        let client = DriveClient::with_base_url(&server.uri(), "test-token").unwrap();

        MirrorRuntime::with_client(config.clone(), client)
            .run()
            .await
            .unwrap();

        let logged = std::fs::read_to_string(&config.log_path).unwrap();
        assert!(logged.contains("no root folders found"));
    }

    #[tokio::test]
    async fn bootstrap_fails_without_credentials() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        // No token env override in tests; the token file simply does not
        // exist, which is the fatal missing-credentials case.
        if std::env::var(crate::token::TOKEN_ENV).is_ok() {
            return;
        }
        let err = MirrorRuntime::bootstrap(config).await.unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
    }
}
