use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::audio::{measure_duration, read_wav, resample, write_wav, PcmAudio};
use crate::error::{GermanizerError, Result};
use crate::scratch::{ScratchDir, ScratchFile};

/// Playback speed needed to fit `current` seconds into `target` seconds.
pub fn speed_factor(current: f64, target: f64) -> f64 {
    current / target
}

/// Frame rate at which the unchanged sample buffer plays `factor` times faster.
pub fn scaled_frame_rate(frame_rate: u32, factor: f64) -> u32 {
    (frame_rate as f64 * factor).round() as u32
}

/// Result of fitting an audio file into its time slot.
#[derive(Debug)]
pub enum Adjustment {
    /// Audio already fits; the input file was not touched.
    Unchanged { path: PathBuf, duration: f64 },
    /// Audio was sped up into a new scratch file.
    SpedUp {
        output: ScratchFile,
        speed_factor: f64,
        duration: f64,
    },
}

impl Adjustment {
    pub fn path(&self) -> &Path {
        match self {
            Adjustment::Unchanged { path, .. } => path,
            Adjustment::SpedUp { output, .. } => output,
        }
    }

    /// Duration measured from the file on disk.
    pub fn duration(&self) -> f64 {
        match self {
            Adjustment::Unchanged { duration, .. } | Adjustment::SpedUp { duration, .. } => *duration,
        }
    }

    pub fn is_adjusted(&self) -> bool {
        matches!(self, Adjustment::SpedUp { .. })
    }
}

/// Speeds up audio that overruns its slot. Never slows anything down.
///
/// Speed-up works by re-reading the raw samples at a higher frame rate, so
/// pitch rises together with tempo. The result is resampled to a fixed output
/// rate so every adjusted segment shares one format.
#[derive(Debug, Clone)]
pub struct DurationAdjuster {
    scratch: ScratchDir,
    output_sample_rate: u32,
}

impl DurationAdjuster {
    pub fn new(scratch: ScratchDir, output_sample_rate: u32) -> Self {
        Self {
            scratch,
            output_sample_rate,
        }
    }

    pub fn adjust(&self, audio_path: &Path, target_duration: f64) -> Result<Adjustment> {
        if !target_duration.is_finite() || target_duration <= 0.0 {
            return Err(GermanizerError::Adjustment(format!(
                "Target duration must be positive, got {}",
                target_duration
            )));
        }

        let current = measure_duration(audio_path).map_err(|e| {
            GermanizerError::Adjustment(format!("Failed to read {}: {}", audio_path.display(), e))
        })?;

        if current <= target_duration {
            debug!(
                "{} fits its slot ({:.2}s <= {:.2}s)",
                audio_path.display(),
                current,
                target_duration
            );
            return Ok(Adjustment::Unchanged {
                path: audio_path.to_path_buf(),
                duration: current,
            });
        }

        let audio = read_wav(audio_path).map_err(|e| {
            GermanizerError::Adjustment(format!("Failed to decode {}: {}", audio_path.display(), e))
        })?;
        let factor = speed_factor(current, target_duration);
        let new_rate = scaled_frame_rate(audio.sample_rate, factor);

        info!(
            "Speeding up {:.2}s -> {:.2}s (x{:.3}, {} Hz -> {} Hz)",
            current, target_duration, factor, audio.sample_rate, new_rate
        );

        let reinterpreted = PcmAudio {
            sample_rate: new_rate,
            ..audio
        };
        let out_frames = (reinterpreted.frames() as f64 * self.output_sample_rate as f64 / new_rate as f64).round();
        if out_frames < 1.0 {
            return Err(GermanizerError::Adjustment(format!(
                "Target {:.6}s is too short to hold any audio at {} Hz",
                target_duration, self.output_sample_rate
            )));
        }
        let resampled = resample(&reinterpreted, self.output_sample_rate)?;

        let output = self.scratch.file("tts_adjusted_", ".wav")?;
        write_wav(&output, &resampled).map_err(|e| {
            GermanizerError::Adjustment(format!("Failed to encode {}: {}", output.display(), e))
        })?;
        let duration = measure_duration(&output)?;

        debug!("Adjusted audio written to {} ({:.3}s)", output.display(), duration);

        Ok(Adjustment::SpedUp {
            output,
            speed_factor: factor,
            duration,
        })
    }
}
