use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::DownloadConfig;
use crate::error::{GermanizerError, Result};
use crate::media::MediaCommand;

/// Downloads a video into a local directory.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Download `url` into `dest_dir` and return the path of the video file.
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

/// `yt-dlp` backed fetcher that walks a list of format selectors until one works.
pub struct YtDlpFetcher {
    config: DownloadConfig,
}

impl YtDlpFetcher {
    pub fn new(config: DownloadConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, url: &str, format: &str, dest_dir: &Path) -> MediaCommand {
        let template = dest_dir.join("%(title).80s.%(ext)s");

        MediaCommand::new(&self.config.binary_path, format!("Download with format '{}'", format))
            .fail_as(GermanizerError::Download)
            .arg("--no-playlist")
            .arg("--restrict-filenames")
            .arg("-f")
            .arg(format)
            .arg("--merge-output-format")
            .arg("mp4")
            .path_arg("-o", template)
            .arg("--print")
            .arg("after_move:filepath")
            .arg(url)
    }
}

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dest_dir).await?;
        info!("Downloading {}", url);

        let mut last_error = None;
        for format in &self.config.formats {
            match self.build_command(url, format, dest_dir).execute_with_output().await {
                Ok(stdout) => {
                    let path = downloaded_path(&stdout).ok_or_else(|| {
                        GermanizerError::Download("yt-dlp did not report the downloaded file".to_string())
                    })?;
                    if !path.exists() {
                        return Err(GermanizerError::Download(format!(
                            "Downloaded file is missing: {}",
                            path.display()
                        )));
                    }
                    info!("Downloaded video to {}", path.display());
                    return Ok(path);
                }
                Err(e) => {
                    warn!("Format '{}' failed: {}", format, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            GermanizerError::Download("No download formats configured".to_string())
        }))
    }
}

/// Last non-empty line of the `--print after_move:filepath` output.
fn downloaded_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(PathBuf::from)
}
