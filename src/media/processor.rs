use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::{MediaCommandBuilder, MediaProcessorTrait};
use crate::config::MediaConfig;
use crate::error::{GermanizerError, Result};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        self.command_builder
            .extract_audio(video_path, audio_path, self.config.extract_sample_rate)
            .execute()
            .await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn mux_audio(&self, video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<()> {
        info!(
            "Replacing audio of {} with {} -> {}",
            video_path.display(),
            audio_path.display(),
            output_path.display()
        );

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.command_builder
            .mux_audio(
                video_path,
                audio_path,
                output_path,
                &self.config.audio_bitrate,
                &self.config.mux_options,
            )
            .execute()
            .await?;

        info!("Audio track replacement completed");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        self.get_version_info().await.map(|version| {
            info!("Media processor is available: {}", version);
        })
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let stdout = self
            .command_builder
            .version_check()
            .execute_with_output()
            .await
            .map_err(|e| GermanizerError::Media(format!("Media processor not usable: {}", e)))?;

        Ok(stdout.lines().next().unwrap_or("Unknown version").to_string())
    }
}
