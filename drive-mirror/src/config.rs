use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_LOCAL_DIR_NAME: &str = "Computers_Drive";
const DEFAULT_LOG_FILE: &str = "download_progress.log";
const DEFAULT_TOKEN_FILE: &str = "token.json";
const DEFAULT_MAX_PASSES: u32 = 3;
const DEFAULT_PASS_DELAY_SECS: u64 = 30;
const DEFAULT_FRESHNESS_DAYS: u64 = 3;
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_THUMBNAIL_EDGE: u32 = 800;
const DEFAULT_JPEG_QUALITY: u8 = 90;
const DEFAULT_PARALLELISM_FALLBACK: usize = 4;
const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 3600;

/// Per-folder reconciliation policy. One instance governs the whole run;
/// there is no per-folder state behind these knobs.
#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    /// Upper bound on listing+download sweeps per folder.
    pub max_passes: u32,
    /// Wait between passes of a folder that is still finding new files.
    pub inter_pass_delay: Duration,
    /// Local copies older than this many whole days are re-downloaded.
    pub freshness_days: u64,
    /// Remote listing page size.
    pub page_size: u32,
    /// Re-encode downloaded images as bounded JPEG thumbnails.
    pub resize_images: bool,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub jpeg_quality: u8,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            inter_pass_delay: Duration::from_secs(DEFAULT_PASS_DELAY_SECS),
            freshness_days: DEFAULT_FRESHNESS_DAYS,
            page_size: DEFAULT_PAGE_SIZE,
            resize_images: true,
            thumbnail_width: DEFAULT_THUMBNAIL_EDGE,
            thumbnail_height: DEFAULT_THUMBNAIL_EDGE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub local_base: PathBuf,
    pub log_path: PathBuf,
    pub token_path: PathBuf,
    pub parallelism: usize,
    pub per_batch_timeout: Duration,
    pub policy: ReconcilePolicy,
}

impl MirrorConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("working directory is unavailable")?;
        let local_base = std::env::var("DRIVE_MIRROR_LOCAL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| cwd.join(DEFAULT_LOCAL_DIR_NAME));
        let log_path = std::env::var("DRIVE_MIRROR_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| cwd.join(DEFAULT_LOG_FILE));
        let token_path = std::env::var("DRIVE_MIRROR_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| cwd.join(DEFAULT_TOKEN_FILE));

        let parallelism = parse_usize(
            env_value("DRIVE_MIRROR_PARALLELISM"),
            detected_parallelism(),
        );
        let per_batch_timeout = Duration::from_secs(parse_u64(
            env_value("DRIVE_MIRROR_BATCH_TIMEOUT_SECS"),
            DEFAULT_BATCH_TIMEOUT_SECS,
        ));

        let policy = ReconcilePolicy {
            max_passes: parse_u64(
                env_value("DRIVE_MIRROR_MAX_PASSES"),
                u64::from(DEFAULT_MAX_PASSES),
            )
            .max(1) as u32,
            inter_pass_delay: Duration::from_secs(parse_u64(
                env_value("DRIVE_MIRROR_PASS_DELAY_SECS"),
                DEFAULT_PASS_DELAY_SECS,
            )),
            freshness_days: parse_u64(
                env_value("DRIVE_MIRROR_FRESHNESS_DAYS"),
                DEFAULT_FRESHNESS_DAYS,
            ),
            page_size: parse_u64(
                env_value("DRIVE_MIRROR_PAGE_SIZE"),
                u64::from(DEFAULT_PAGE_SIZE),
            )
            .max(1) as u32,
            resize_images: parse_bool(env_value("DRIVE_MIRROR_RESIZE"), true),
            thumbnail_width: parse_u64(
                env_value("DRIVE_MIRROR_THUMBNAIL_WIDTH"),
                u64::from(DEFAULT_THUMBNAIL_EDGE),
            )
            .max(1) as u32,
            thumbnail_height: parse_u64(
                env_value("DRIVE_MIRROR_THUMBNAIL_HEIGHT"),
                u64::from(DEFAULT_THUMBNAIL_EDGE),
            )
            .max(1) as u32,
            jpeg_quality: parse_u64(
                env_value("DRIVE_MIRROR_JPEG_QUALITY"),
                u64::from(DEFAULT_JPEG_QUALITY),
            )
            .clamp(1, 100) as u8,
        };

        Ok(Self {
            local_base,
            log_path,
            token_path,
            parallelism,
            per_batch_timeout,
            policy,
        })
    }
}

fn detected_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_PARALLELISM_FALLBACK)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_u64(value: Option<String>, default: u64) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(value: Option<String>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}
