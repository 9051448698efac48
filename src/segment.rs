use std::path::PathBuf;
use tracing::debug;

use crate::adjust::{Adjustment, DurationAdjuster};
use crate::audio::measure_duration;
use crate::error::{GermanizerError, Result};
use crate::scratch::ScratchFile;
use crate::text::snippet;
use crate::tts::Synthesizer;

/// Characters of segment text quoted in error messages.
pub const SNIPPET_CHARS: usize = 50;

/// A finished segment WAV. The caller owns the file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    /// Seconds, measured from the file on disk
    pub duration: f64,
}

/// Synthesizes one segment and fits it into its time slot.
#[derive(Clone)]
pub struct SegmentGenerator {
    synthesizer: Synthesizer,
    adjuster: DurationAdjuster,
}

impl SegmentGenerator {
    pub fn new(synthesizer: Synthesizer, adjuster: DurationAdjuster) -> Self {
        Self { synthesizer, adjuster }
    }

    pub async fn generate(&self, text: &str, target_duration: f64) -> Result<AudioArtifact> {
        self.run(text, Some(target_duration))
            .await
            .map_err(|e| segment_failed(text, e))
    }

    /// Synthesize without fitting to a target duration.
    pub async fn generate_untimed(&self, text: &str) -> Result<AudioArtifact> {
        self.run(text, None).await.map_err(|e| segment_failed(text, e))
    }

    async fn run(&self, text: &str, target_duration: Option<f64>) -> Result<AudioArtifact> {
        let synthesized = self.synthesizer.synthesize(text).await?;

        let Some(target) = target_duration else {
            let source = synthesized.to_path_buf();
            let duration = blocking(move || measure_duration(&source)).await?;
            return keep(synthesized, duration);
        };

        let adjuster = self.adjuster.clone();
        let source = synthesized.to_path_buf();
        let adjustment = blocking(move || adjuster.adjust(&source, target)).await?;

        match adjustment {
            Adjustment::Unchanged { duration, .. } => keep(synthesized, duration),
            Adjustment::SpedUp {
                output,
                speed_factor,
                duration,
            } => {
                debug!("Segment sped up x{:.3}, dropping {}", speed_factor, synthesized.display());
                drop(synthesized);
                keep(output, duration)
            }
        }
    }
}

fn segment_failed(text: &str, source: GermanizerError) -> GermanizerError {
    GermanizerError::SegmentFailed {
        snippet: snippet(text, SNIPPET_CHARS),
        source: Box::new(source),
    }
}

fn keep(file: ScratchFile, duration: f64) -> Result<AudioArtifact> {
    let path = file.keep().map_err(std::io::Error::from)?;
    Ok(AudioArtifact { path, duration })
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| GermanizerError::Adjustment(format!("Audio task failed: {}", e)))?
}
