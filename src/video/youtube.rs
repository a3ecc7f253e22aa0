use std::path::{Path, PathBuf};

use log::info;
use tokio::{fs, process};

use crate::{
    errors::{BotError, BotResult},
    temp_file::TempFile,
};

/// Telegram bots can't upload anything bigger than this
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Tried in order: a single mp4 stream from the highest resolution down,
/// then separate video+audio merged into one container, then anything.
const FORMAT_PREFERENCES: &[&str] = &[
    "best[height>=2160][ext=mp4]",
    "best[height>=1440][ext=mp4]",
    "best[height>=1080][ext=mp4]",
    "bestvideo[height>=2160][ext=mp4]+bestaudio[ext=m4a]",
    "best[height>=2160]",
    "bestvideo[height>=1440][ext=mp4]+bestaudio[ext=m4a]",
    "best[height>=1440]",
    "bestvideo[height>=1080][ext=mp4]+bestaudio[ext=m4a]",
    "best[height>=1080]",
    "best[ext=mp4]",
    "best",
];

/// Leftovers yt-dlp writes while a download is still in progress
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl"];

pub fn format_selector() -> String {
    FORMAT_PREFERENCES.join("/")
}

/// Reject files Telegram would refuse anyway
pub fn ensure_uploadable(size: u64) -> BotResult<()> {
    if size > MAX_UPLOAD_BYTES {
        return Err(BotError::file_too_large(format!(
            "{} bytes, limit is {} bytes",
            size, MAX_UPLOAD_BYTES
        )));
    }
    Ok(())
}

/// Runs yt-dlp and keeps its output in a scratch directory
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    program: String,
    scratch_dir: PathBuf,
}

impl MediaFetcher {
    pub fn new(program: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Title of the video without downloading it; `None` if yt-dlp can't tell
    pub async fn fetch_title(&self, url: &str) -> Option<String> {
        let output = process::Command::new(&self.program)
            .arg("--no-playlist")
            .arg("--skip-download")
            .arg("--no-warnings")
            .args(["--print", "title"])
            .arg(url)
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let title = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!title.is_empty() && title != "NA").then_some(title)
            }
            Ok(output) => {
                log::warn!(
                    "Could not get title for {}: {}",
                    url,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                log::warn!("Could not run {} for title of {}: {}", self.program, url, e);
                None
            }
        }
    }

    /// Download `url` into the scratch directory.
    ///
    /// Every attempt gets its own `video_<id>` prefix so concurrent requests
    /// never touch each other's files. Anything left behind by a failed
    /// attempt is removed before returning the error.
    pub async fn fetch(&self, url: &str) -> BotResult<TempFile> {
        fs::create_dir_all(&self.scratch_dir).await?;

        let prefix = format!("video_{}", short_id());
        let template = self.scratch_dir.join(format!("{}.%(ext)s", prefix));

        info!("Starting download: {} -> {}", url, template.display());

        let result = self.run_download(url, &template, &prefix).await;
        if result.is_err() {
            remove_prefixed(&self.scratch_dir, &prefix).await;
        }
        result
    }

    async fn run_download(&self, url: &str, template: &Path, prefix: &str) -> BotResult<TempFile> {
        let output = process::Command::new(&self.program)
            .args(download_args(url, &template.to_string_lossy()))
            .output()
            .await
            .map_err(|e| BotError::external_command_error(&self.program, e.to_string()))?;

        info!("yt-dlp exit code: {:?}", output.status.code());

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            log::error!("yt-dlp failed: {}", stderr);
            return Err(BotError::download_failed(stderr));
        }

        let path = find_output(&self.scratch_dir, prefix)
            .await?
            .ok_or_else(|| BotError::file_not_found(format!("{}.*", prefix)))?;

        info!("Download successful: {}", path.display());
        Ok(TempFile::new(path))
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn download_args(url: &str, template: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        "--no-playlist",
        "--quiet",
        "--no-warnings",
        "--merge-output-format",
        "mp4",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.extend(["-f".to_string(), format_selector()]);
    args.extend(["-o".to_string(), template.to_string()]);
    args.push(url.to_string());
    args
}

fn is_output_of(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('.'))
        && !PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s))
}

/// Locate the finished file yt-dlp produced for `prefix`
async fn find_output(dir: &Path, prefix: &str) -> BotResult<Option<PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_output_of(name, prefix) && entry.file_type().await?.is_file() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

/// Best effort removal of everything an attempt wrote, partial files included
async fn remove_prefixed(dir: &Path, prefix: &str) {
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&format!("{}.", prefix)));
        if matches {
            if let Err(e) = fs::remove_file(entry.path()).await {
                log::warn!("Failed to remove {:?}: {}", entry.path(), e);
            }
        }
    }
}
