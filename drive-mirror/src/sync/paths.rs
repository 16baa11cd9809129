use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("remote entry name is empty")]
    EmptyName,
    #[error("remote entry name is not a safe path component: {0:?}")]
    UnsupportedName(String),
}

/// Maps a remote entry name to a child path under `parent`.
///
/// Remote names become single path components; anything that could escape
/// the mirror subtree is rejected.
pub fn child_path(parent: &Path, remote_name: &str) -> Result<PathBuf, PathError> {
    if remote_name.is_empty() {
        return Err(PathError::EmptyName);
    }
    if remote_name == "." || remote_name == ".." {
        return Err(PathError::UnsupportedName(remote_name.to_string()));
    }
    if remote_name.contains(['/', '\\']) || remote_name.contains('\0') {
        return Err(PathError::UnsupportedName(remote_name.to_string()));
    }
    Ok(parent.join(remote_name))
}
