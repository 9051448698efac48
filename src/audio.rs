//! WAV helpers shared by synthesis, duration adjustment and track assembly.
//!
//! Samples are held as interleaved `f32` in `[-1.0, 1.0]`; everything written
//! back to disk is 16-bit PCM.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{GermanizerError, Result};

const RESAMPLE_CHUNK: usize = 1024;

/// Fade applied where an overlong track is cut.
pub const TRACK_FADE_SECS: f64 = 0.15;

/// Decoded PCM audio, interleaved by channel.
#[derive(Debug, Clone)]
pub struct PcmAudio {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl PcmAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Average all channels into one.
    pub fn to_mono(&self) -> PcmAudio {
        if self.channels <= 1 {
            return self.clone();
        }
        let channels = self.channels as usize;
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();
        PcmAudio {
            channels: 1,
            sample_rate: self.sample_rate,
            samples,
        }
    }
}

/// Duration of a WAV file in seconds, read from its header.
pub fn measure_duration<P: AsRef<Path>>(path: P) -> Result<f64> {
    let reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<PcmAudio> {
    let mut reader = WavReader::open(path.as_ref())?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(PcmAudio {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        samples,
    })
}

/// Write `audio` as 16-bit PCM.
pub fn write_wav<P: AsRef<Path>>(path: P, audio: &PcmAudio) -> Result<()> {
    let spec = WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for &sample in &audio.samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Append the sample data of `inputs` into one WAV at `output`.
///
/// Every input must share the first input's channel count, sample rate and
/// sample encoding; samples are copied without conversion.
pub fn concat_wavs<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<()> {
    let first = inputs
        .first()
        .ok_or_else(|| GermanizerError::AudioFormat("Nothing to concatenate".to_string()))?;
    let spec = WavReader::open(first.as_ref())?.spec();
    let mut writer = WavWriter::create(output, spec)?;

    for (idx, input) in inputs.iter().enumerate() {
        let mut reader = WavReader::open(input.as_ref())?;
        let chunk_spec = reader.spec();
        if chunk_spec != spec {
            return Err(GermanizerError::AudioFormat(format!(
                "Chunk {} is {} Hz/{} ch/{} bit but chunk 1 is {} Hz/{} ch/{} bit",
                idx + 1,
                chunk_spec.sample_rate,
                chunk_spec.channels,
                chunk_spec.bits_per_sample,
                spec.sample_rate,
                spec.channels,
                spec.bits_per_sample
            )));
        }

        match spec.sample_format {
            SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    writer.write_sample(sample?)?;
                }
            }
            SampleFormat::Int => {
                for sample in reader.samples::<i32>() {
                    writer.write_sample(sample?)?;
                }
            }
        }
    }

    writer.finalize()?;
    debug!("Concatenated {} WAV files into {}", inputs.len(), output.display());
    Ok(())
}

/// Resample to `target_rate`, keeping the duration.
pub fn resample(audio: &PcmAudio, target_rate: u32) -> Result<PcmAudio> {
    if audio.sample_rate == target_rate {
        return Ok(audio.clone());
    }

    let channels = audio.channels.max(1) as usize;
    let frames = audio.frames();
    let ratio = target_rate as f64 / audio.sample_rate as f64;
    let expected = (frames as f64 * ratio).round() as usize;

    let mut resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, RESAMPLE_CHUNK, channels)
        .map_err(|e| GermanizerError::Resample(format!("Resampler init failed: {}", e)))?;
    let delay = resampler.output_delay();

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|ch| audio.samples.iter().skip(ch).step_by(channels).copied().collect())
        .collect();
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay + RESAMPLE_CHUNK); channels];

    let append = |out: &mut Vec<Vec<f32>>, block: Vec<Vec<f32>>| {
        for (dst, src) in out.iter_mut().zip(block) {
            dst.extend(src);
        }
    };

    let mut pos = 0;
    while frames - pos >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let block: Vec<&[f32]> = planar.iter().map(|c| &c[pos..pos + needed]).collect();
        let produced = resampler
            .process(&block, None)
            .map_err(|e| GermanizerError::Resample(format!("Resampling failed: {}", e)))?;
        append(&mut out, produced);
        pos += needed;
    }

    if pos < frames {
        let block: Vec<&[f32]> = planar.iter().map(|c| &c[pos..]).collect();
        let produced = resampler
            .process_partial(Some(block.as_slice()), None)
            .map_err(|e| GermanizerError::Resample(format!("Resampling failed: {}", e)))?;
        append(&mut out, produced);
    }

    // Drain the filter delay so the tail is not cut off
    while out[0].len() < delay + expected {
        let produced = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|e| GermanizerError::Resample(format!("Resampling failed: {}", e)))?;
        if produced[0].is_empty() {
            break;
        }
        append(&mut out, produced);
    }

    let mut samples = Vec::with_capacity(expected * channels);
    for frame in 0..expected {
        for channel in &out {
            samples.push(channel.get(delay + frame).copied().unwrap_or(0.0));
        }
    }

    Ok(PcmAudio {
        channels: audio.channels,
        sample_rate: target_rate,
        samples,
    })
}

/// A synthesized segment and the time it should start on the output track.
#[derive(Debug, Clone)]
pub struct TrackPlacement {
    pub path: PathBuf,
    pub start: f64,
}

/// Lay `placements` onto a mono timeline of exactly `duration` seconds and
/// write it to `output`.
///
/// Each segment starts at its requested time, or right after the previous
/// segment if that one is still playing. Gaps and the tail are silent. Audio
/// pushed past `duration` is cut off and the last `TRACK_FADE_SECS` faded out.
/// Returns the written duration.
pub fn assemble_track(
    placements: &[TrackPlacement],
    duration: f64,
    sample_rate: u32,
    output: &Path,
) -> Result<f64> {
    let mut track: Vec<f32> = Vec::new();

    for placement in placements {
        let audio = read_wav(&placement.path)?.to_mono();
        let audio = resample(&audio, sample_rate)?;

        let requested = (placement.start.max(0.0) * sample_rate as f64).round() as usize;
        if requested < track.len() {
            debug!(
                "Segment at {:.2}s delayed by {:.2}s to avoid overlap",
                placement.start,
                (track.len() - requested) as f64 / sample_rate as f64
            );
        }
        let offset = requested.max(track.len());
        track.resize(offset, 0.0);
        track.extend_from_slice(&audio.samples);
    }

    let frames = (duration.max(0.0) * sample_rate as f64).round() as usize;
    if track.len() > frames {
        warn!(
            "Dubbed track runs {:.2}s past the source; cutting it to {:.2}s",
            (track.len() - frames) as f64 / sample_rate as f64,
            duration
        );
        track.truncate(frames);
        fade_out(&mut track, (TRACK_FADE_SECS * sample_rate as f64).round() as usize);
    } else {
        track.resize(frames, 0.0);
    }

    write_wav(output, &PcmAudio { channels: 1, sample_rate, samples: track })?;
    measure_duration(output)
}

/// Linear ramp to silence over the last `frames` samples.
fn fade_out(samples: &mut [f32], frames: usize) {
    let frames = frames.min(samples.len());
    let start = samples.len() - frames;
    for (i, sample) in samples[start..].iter_mut().enumerate() {
        *sample *= 1.0 - (i + 1) as f32 / frames as f32;
    }
}
