use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Append-only progress log shared by the coordinator and every worker.
///
/// Each entry is timestamped and written with a single `O_APPEND` write, so
/// concurrent appenders never interleave within a line. Every entry is also
/// mirrored to stderr. The sink itself never fails the run; a write error is
/// silently dropped.
#[derive(Debug, Clone)]
pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, line: &str) {
        let stamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let entry = format!("{stamp} {line}\n");
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = file.write_all(entry.as_bytes());
        }
        eprint!("{entry}");
    }
}
