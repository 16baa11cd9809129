use drive_core::{DriveClient, RemoteEntry};

use crate::logbook::ProgressLog;
use crate::sync::retry::with_retry;

/// Pages through every folder in the store and keeps the ones with no
/// parent reference. A listing failure after retries aborts the remaining
/// pagination and returns whatever was gathered so far.
pub async fn list_root_folders(
    client: &DriveClient,
    log: &ProgressLog,
    page_size: u32,
) -> Vec<RemoteEntry> {
    log.append("fetching root folders");
    let mut roots = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = with_retry(|| {
            let token = page_token.clone();
            async move { client.list_folders(page_size, token.as_deref()).await }
        })
        .await;

        match page {
            Ok(page) => {
                roots.extend(page.files.into_iter().filter(|f| f.is_root_folder()));
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
            Err(err) => {
                log.append(&format!("error while listing root folders: {err}"));
                break;
            }
        }
    }

    log.append(&format!("found {} root folders", roots.len()));
    roots
}
