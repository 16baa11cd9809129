use std::path::Path;
use std::time::Duration;

use drive_core::RemoteEntry;
use tokio::time::Instant;

use crate::logbook::ProgressLog;
use crate::sync::paths::child_path;
use crate::sync::reconciler::FolderReconciler;

/// Splits `items` into `batch_count` batches of near-equal size: order is
/// preserved, sizes differ by at most one, and the first `len % batch_count`
/// batches carry the extra element.
pub fn split_batches<T>(items: Vec<T>, batch_count: usize) -> Vec<Vec<T>> {
    let batch_count = batch_count.max(1);
    let base = items.len() / batch_count;
    let extra = items.len() % batch_count;

    let mut batches = Vec::with_capacity(batch_count);
    let mut iter = items.into_iter();
    for index in 0..batch_count {
        let size = base + usize::from(index < extra);
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

/// Runs one isolated worker per non-empty batch of root folders and
/// supervises them against a shared deadline. Workers share nothing mutable:
/// each owns its batch, a clone of the reconciler, and a disjoint local
/// subtree.
pub struct BatchScheduler {
    reconciler: FolderReconciler,
    log: ProgressLog,
    parallelism: usize,
    per_batch_timeout: Duration,
}

impl BatchScheduler {
    pub fn new(
        reconciler: FolderReconciler,
        log: ProgressLog,
        parallelism: usize,
        per_batch_timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            log,
            parallelism,
            per_batch_timeout,
        }
    }

    /// Returns once every worker has finished or been aborted. Success means
    /// completion of supervision, not of every download; per-file outcomes
    /// live in the log.
    pub async fn run_all(&self, roots: Vec<RemoteEntry>, local_base: &Path) {
        let batches = split_batches(roots, self.parallelism);
        self.log.append(&format!(
            "starting mirror with {} parallel batches",
            batches.iter().filter(|b| !b.is_empty()).count()
        ));

        let mut workers = Vec::new();
        for (index, batch) in batches.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            let worker_id = index + 1;
            let reconciler = self.reconciler.clone();
            let log = self.log.clone();
            let base = local_base.to_path_buf();
            workers.push((
                worker_id,
                tokio::spawn(async move {
                    run_batch(worker_id, batch, &base, &reconciler, &log).await;
                }),
            ));
        }

        let deadline = Instant::now() + self.per_batch_timeout;
        for (worker_id, mut handle) in workers {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    self.log
                        .append(&format!("worker {worker_id} failed: {join_err}"));
                }
                Err(_) => {
                    handle.abort();
                    let _ = handle.await;
                    self.log.append(&format!(
                        "warning: worker {worker_id} still running after {}s; terminated \
                         (partial work on disk stands)",
                        self.per_batch_timeout.as_secs()
                    ));
                }
            }
        }

        self.log.append("all batches completed");
    }
}

async fn run_batch(
    worker_id: usize,
    batch: Vec<RemoteEntry>,
    local_base: &Path,
    reconciler: &FolderReconciler,
    log: &ProgressLog,
) {
    let total = batch.len();
    for (position, folder) in batch.iter().enumerate() {
        log.append(&format!(
            "[batch {worker_id}] ({}/{total}) processing: {}",
            position + 1,
            folder.name
        ));
        match child_path(local_base, &folder.name) {
            Ok(path) => reconciler.reconcile(&folder.id, &path).await,
            Err(err) => log.append(&format!(
                "[batch {worker_id}] skipping root folder {} ({}): {err}",
                folder.name, folder.id
            )),
        }
    }
    log.append(&format!("[batch {worker_id}] batch complete"));
}
