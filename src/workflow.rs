use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::adjust::DurationAdjuster;
use crate::audio::{assemble_track, measure_duration, TrackPlacement};
use crate::batch::{BatchOrchestrator, ItemOutcome};
use crate::config::Config;
use crate::error::{GermanizerError, Result};
use crate::fetch::{VideoFetcher, YtDlpFetcher};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::scratch::ScratchDir;
use crate::segment::SegmentGenerator;
use crate::transcribe::{TranscriberFactory, TranscriptSegment, Transcriber};
use crate::translate::{translate_segments, OllamaTranslator, Translator};
use crate::tts::{SpeechModel, SpeechModelFactory, SynthesisConfig, Synthesizer};

/// Per-run settings of the `dub` pipeline
#[derive(Debug, Clone)]
pub struct DubOptions {
    pub source_language: String,
    pub output_dir: PathBuf,
    pub max_workers: usize,
    pub keep_scratch: bool,
}

/// A segment that is silent in the dubbed track
#[derive(Debug, Clone)]
pub struct SkippedSegment {
    pub index: usize,
    pub start: f64,
    pub reason: String,
}

#[derive(Debug)]
pub struct DubOutcome {
    pub video: PathBuf,
    pub segments: usize,
    pub skipped: Vec<SkippedSegment>,
}

pub struct Workflow {
    config: Config,
    fetcher: Box<dyn VideoFetcher>,
    media: Box<dyn MediaProcessorTrait>,
    transcriber: Box<dyn Transcriber>,
    translator: Box<dyn Translator>,
    model: Arc<dyn SpeechModel>,
}

impl Workflow {
    /// Build the production pipeline and check every external dependency once.
    pub async fn new(config: Config) -> Result<Self> {
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        media.check_availability().await?;

        let translator = Box::new(OllamaTranslator::new(config.translate.clone())?);
        translator.check_model().await?;

        let fetcher = Box::new(YtDlpFetcher::new(config.download.clone()));
        let transcriber = TranscriberFactory::create_default(config.transcriber.clone())?;
        let model = SpeechModelFactory::load(&config.tts).await?;

        Ok(Self::with_components(config, fetcher, media, transcriber, translator, model))
    }

    pub fn with_components(
        config: Config,
        fetcher: Box<dyn VideoFetcher>,
        media: Box<dyn MediaProcessorTrait>,
        transcriber: Box<dyn Transcriber>,
        translator: Box<dyn Translator>,
        model: Arc<dyn SpeechModel>,
    ) -> Self {
        Self {
            config,
            fetcher,
            media,
            transcriber,
            translator,
            model,
        }
    }

    /// Download, transcribe, translate, re-voice and remux one video.
    pub async fn dub(&self, url: &str, options: &DubOptions) -> Result<DubOutcome> {
        let run_dir = self
            .config
            .scratch
            .dir
            .join(format!("run_{}", Local::now().format("%Y%m%d_%H%M%S_%3f")));
        let scratch = ScratchDir::new(&run_dir)?;

        let result = self.run(url, options, &scratch).await;

        if options.keep_scratch {
            info!("Keeping intermediate files in {}", scratch.path().display());
        } else {
            scratch.remove().await;
        }

        let outcome = result?;
        if let Err(e) = prune_outputs(&options.output_dir, self.config.output.max_kept).await {
            warn!("Could not prune old outputs in {}: {}", options.output_dir.display(), e);
        }
        Ok(outcome)
    }

    async fn run(&self, url: &str, options: &DubOptions, scratch: &ScratchDir) -> Result<DubOutcome> {
        info!("Step 1/7: Downloading video");
        let video = self.fetcher.fetch(url, &scratch.path().join("download")).await?;

        info!("Step 2/7: Extracting audio");
        let source_audio = scratch.path().join("source_audio.wav");
        self.media.extract_audio(&video, &source_audio).await?;
        let source_duration = measure_duration(&source_audio)?;

        info!("Step 3/7: Transcribing ({})", options.source_language);
        let transcript = self
            .transcriber
            .transcribe(&source_audio, &options.source_language)
            .await?;

        info!("Step 4/7: Translating {} segments", transcript.len());
        let translated = translate_segments(
            self.translator.as_ref(),
            &transcript,
            &self.config.translate.target_language,
        )
        .await;
        let segments = timed_segments(translated);
        if segments.is_empty() {
            return Err(GermanizerError::Transcription("No speech segments to dub".to_string()));
        }

        info!("Step 5/7: Synthesizing {} segments", segments.len());
        let orchestrator = self.orchestrator(scratch)?;
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let durations: Vec<f64> = segments.iter().map(TranscriptSegment::duration).collect();
        let report = orchestrator
            .generate_batch_with_timing(&texts, &durations, options.max_workers)
            .await?;

        if report.artifacts().next().is_none() {
            return Err(GermanizerError::Synthesis("No segment could be synthesized".to_string()));
        }

        let mut placements = Vec::new();
        let mut skipped = Vec::new();
        for item in report.into_input_order() {
            let start = segments[item.index].start;
            match item.outcome {
                ItemOutcome::Completed(artifact) => placements.push(TrackPlacement {
                    path: artifact.path,
                    start,
                }),
                ItemOutcome::Failed { reason } => skipped.push(SkippedSegment {
                    index: item.index,
                    start,
                    reason,
                }),
            }
        }
        for segment in &skipped {
            warn!("Segment {} at {:.2}s stays silent: {}", segment.index, segment.start, segment.reason);
        }

        info!("Step 6/7: Assembling dubbed track");
        let track = scratch.path().join("dubbed_audio.wav");
        let sample_rate = self.config.tts.output_sample_rate;
        let track_path = track.clone();
        let track_duration = tokio::task::spawn_blocking(move || {
            assemble_track(&placements, source_duration, sample_rate, &track_path)
        })
        .await
        .map_err(|e| GermanizerError::Media(format!("Track assembly task failed: {}", e)))??;
        info!("Dubbed track is {:.1}s long", track_duration);

        info!("Step 7/7: Muxing final video");
        fs::create_dir_all(&options.output_dir).await?;
        let output = output_path(&options.output_dir, &video, &self.config.translate.target_language);
        self.media.mux_audio(&video, &track, &output).await?;

        info!("Dubbed video written to {}", output.display());
        Ok(DubOutcome {
            video: output,
            segments: segments.len(),
            skipped,
        })
    }

    fn orchestrator(&self, scratch: &ScratchDir) -> Result<BatchOrchestrator> {
        let segment_scratch = ScratchDir::new(scratch.path().join("segments"))?;

        let synthesizer = Synthesizer::new(
            Arc::clone(&self.model),
            SynthesisConfig::from_tts_config(&self.config.tts),
            segment_scratch.clone(),
        )?
        .with_chunk_chars(self.config.tts.legacy_chunk_chars)
        .serialize_calls(self.config.tts.serialize_model_calls);
        let adjuster = DurationAdjuster::new(segment_scratch, self.config.tts.output_sample_rate);

        Ok(BatchOrchestrator::new(SegmentGenerator::new(synthesizer, adjuster))
            .with_progress(self.config.batch.show_progress))
    }
}

/// Drop segments that cannot be timed.
fn timed_segments(segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
    segments
        .into_iter()
        .filter(|segment| {
            let keep = segment.duration() > 0.0 && !segment.text.trim().is_empty();
            if !keep {
                warn!("Skipping untimed segment at {:.2}s: {:?}", segment.start, segment.text);
            }
            keep
        })
        .collect()
}

/// Delete the oldest dubbed videos in `output_dir` until `max_kept` remain.
/// `0` keeps everything. Returns the deleted paths.
async fn prune_outputs(output_dir: &Path, max_kept: usize) -> Result<Vec<PathBuf>> {
    if max_kept == 0 {
        return Ok(Vec::new());
    }

    let mut videos = Vec::new();
    let mut entries = fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;
        let is_video = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
        if metadata.is_file() && is_video {
            videos.push((metadata.modified()?, path));
        }
    }

    if videos.len() <= max_kept {
        return Ok(Vec::new());
    }

    videos.sort();
    let excess = videos.len() - max_kept;
    let mut removed = Vec::with_capacity(excess);
    for (_, path) in videos.into_iter().take(excess) {
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted old output {}", path.display());
                removed.push(path);
            }
            Err(e) => warn!("Could not delete old output {}: {}", path.display(), e),
        }
    }
    info!("Pruned {} old outputs, keeping the newest {}", removed.len(), max_kept);
    Ok(removed)
}

/// `<output_dir>/<stem>_<lang>_<timestamp>.mp4`
fn output_path(output_dir: &Path, video: &Path, language: &str) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    output_dir.join(format!(
        "{}_{}_{}.mp4",
        stem,
        language,
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}
