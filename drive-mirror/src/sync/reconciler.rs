use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use drive_core::{DriveClient, DriveError, EntryKind, RemoteEntry};
use futures_util::future::BoxFuture;

use crate::config::ReconcilePolicy;
use crate::logbook::ProgressLog;
use crate::sync::normalize::{ImageNormalizer, human_size};
use crate::sync::paths::child_path;
use crate::sync::retry::with_retry;
use crate::sync::transfer::Downloader;

const SECS_PER_DAY: u64 = 86_400;

/// Per-folder convergence loop: list remote children, download what is
/// missing or stale, recurse into subfolders, and repeat until a pass finds
/// nothing new or the pass budget runs out.
///
/// Every failure below folder scope is converted to a log line here; callers
/// never see an error from `reconcile`.
#[derive(Clone)]
pub struct FolderReconciler {
    client: DriveClient,
    downloader: Downloader,
    normalizer: ImageNormalizer,
    log: ProgressLog,
    policy: ReconcilePolicy,
}

impl FolderReconciler {
    pub fn new(client: DriveClient, log: ProgressLog, policy: ReconcilePolicy) -> Self {
        Self {
            downloader: Downloader::new(client.clone()),
            normalizer: ImageNormalizer::new(
                policy.thumbnail_width,
                policy.thumbnail_height,
                policy.jpeg_quality,
            ),
            client,
            log,
            policy,
        }
    }

    pub async fn reconcile(&self, folder_id: &str, local_path: &Path) {
        let mut visited = HashSet::new();
        self.reconcile_folder(folder_id.to_string(), local_path.to_path_buf(), &mut visited)
            .await;
    }

    /// One folder's convergence loop. `visited` holds the folder ids on the
    /// current traversal path, so a remote hierarchy that reports a folder as
    /// its own descendant terminates instead of recursing forever.
    fn reconcile_folder<'a>(
        &'a self,
        folder_id: String,
        local_path: PathBuf,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if !visited.insert(folder_id.clone()) {
                self.log.append(&format!(
                    "skipping folder {folder_id} at {}: already on this traversal path",
                    local_path.display()
                ));
                return;
            }

            if let Err(err) = tokio::fs::create_dir_all(&local_path).await {
                self.log.append(&format!(
                    "error creating directory {}: {err}",
                    local_path.display()
                ));
                visited.remove(&folder_id);
                return;
            }
            self.log
                .append(&format!("processing folder: {}", local_path.display()));

            // Snapshot of local file names, taken once per folder. Only this
            // reconciler's own writes update it mid-run; external writers are
            // not observed (known limitation).
            let mut existing = snapshot_file_names(&local_path);

            for pass in 1..=self.policy.max_passes {
                match self
                    .run_pass(&folder_id, &local_path, &mut existing, visited)
                    .await
                {
                    Ok(0) => {
                        self.log.append(&format!(
                            "no new files in {} (pass {pass})",
                            local_path.display()
                        ));
                        break;
                    }
                    Ok(new_files) => {
                        self.log.append(&format!(
                            "{new_files} new files in {} (pass {pass})",
                            local_path.display()
                        ));
                        if pass < self.policy.max_passes {
                            tokio::time::sleep(self.policy.inter_pass_delay).await;
                        }
                    }
                    Err(err) => {
                        self.log.append(&format!(
                            "error in folder {}: {err}",
                            local_path.display()
                        ));
                        break;
                    }
                }
            }

            visited.remove(&folder_id);
        })
    }

    /// One listing+download sweep. Returns how many files were newly
    /// downloaded; a listing failure after retries ends the caller's pass
    /// loop.
    async fn run_pass(
        &self,
        folder_id: &str,
        local_path: &Path,
        existing: &mut HashSet<String>,
        visited: &mut HashSet<String>,
    ) -> Result<usize, DriveError> {
        let mut images = Vec::new();
        let mut subfolders = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = with_retry(|| {
                let token = page_token.clone();
                async move {
                    self.client
                        .list_children(folder_id, self.policy.page_size, token.as_deref())
                        .await
                }
            })
            .await?;

            for entry in page.files {
                match entry.kind() {
                    EntryKind::Folder => subfolders.push(entry),
                    EntryKind::Image => images.push(entry),
                    EntryKind::Other => {}
                }
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        let mut new_files = 0usize;
        for image in &images {
            if self.sync_image(image, local_path, existing).await {
                new_files += 1;
            }
        }

        for folder in &subfolders {
            match child_path(local_path, &folder.name) {
                Ok(path) => {
                    self.reconcile_folder(folder.id.clone(), path, visited)
                        .await;
                }
                Err(err) => self.log.append(&format!(
                    "skipping subfolder {} ({}): {err}",
                    folder.name, folder.id
                )),
            }
        }

        Ok(new_files)
    }

    /// Applies the keep/skip/delete/download decision for one remote image.
    /// Returns true when a fresh copy was downloaded.
    async fn sync_image(
        &self,
        entry: &RemoteEntry,
        dir: &Path,
        existing: &mut HashSet<String>,
    ) -> bool {
        let target = match child_path(dir, &entry.name) {
            Ok(target) => target,
            Err(err) => {
                self.log.append(&format!(
                    "skipping file {} ({}): {err}",
                    entry.name, entry.id
                ));
                return false;
            }
        };

        if existing.contains(&entry.name) {
            match local_age_days(&target) {
                Some(age) if age > self.policy.freshness_days => {
                    if let Err(err) = tokio::fs::remove_file(&target).await {
                        self.log.append(&format!(
                            "failed to delete stale file {}: {err}",
                            target.display()
                        ));
                        return false;
                    }
                    self.log.append(&format!(
                        "deleted stale file ({age} days old): {}",
                        target.display()
                    ));
                }
                Some(age) => {
                    self.log.append(&format!(
                        "skipped (exists and recent, {age} days): {}",
                        target.display()
                    ));
                    return false;
                }
                None => {
                    // The snapshot said this file was here, but it is gone
                    // now; fetch a copy as if it were missing.
                }
            }
        }

        match self.downloader.download(&entry.id, &target).await {
            Ok(()) => {
                self.log
                    .append(&format!("downloaded: {}", target.display()));
                existing.insert(entry.name.clone());
                if self.policy.resize_images {
                    self.normalize_and_log(&target).await;
                }
                true
            }
            Err(err) => {
                self.log.append(&format!(
                    "download failed for {} ({}): {err}",
                    entry.name, entry.id
                ));
                false
            }
        }
    }

    async fn normalize_and_log(&self, target: &Path) {
        let normalizer = self.normalizer;
        let path = target.to_path_buf();
        match tokio::task::spawn_blocking(move || normalizer.normalize(&path)).await {
            Ok(Ok(report)) => self.log.append(&format!(
                "resized {}: {}x{} -> {}x{}, {} -> {}",
                target.display(),
                report.original_dims.0,
                report.original_dims.1,
                report.new_dims.0,
                report.new_dims.1,
                human_size(report.original_size),
                human_size(report.new_size)
            )),
            Ok(Err(err)) => self.log.append(&format!("resize skipped: {err}")),
            Err(err) => self.log.append(&format!(
                "resize task failed for {}: {err}",
                target.display()
            )),
        }
    }
}

fn snapshot_file_names(dir: &Path) -> HashSet<String> {
    let mut names = HashSet::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    names
}

/// Whole days since the file was last modified. A future-dated mtime counts
/// as zero; `None` means the file could not be read at all.
fn local_age_days(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    Some(age.as_secs() / SECS_PER_DAY)
}
