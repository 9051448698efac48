use assert_fs::TempDir;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use germanizer::adjust::DurationAdjuster;
use germanizer::audio::measure_duration;
use germanizer::batch::{BatchOrchestrator, ItemOutcome};
use germanizer::config::TtsModelKind;
use germanizer::error::{GermanizerError, Result};
use germanizer::scratch::ScratchDir;
use germanizer::segment::SegmentGenerator;
use germanizer::tts::{SpeechModel, SynthesisConfig, Synthesizer, TtsRequest, Voice};

const SECONDS_PER_CHAR: f64 = 0.12;
const TOLERANCE: f64 = 0.1;

/// Speaks every character for a fixed time as a quiet sine tone.
struct ToneModel {
    calls: AtomicUsize,
    fail_on: Option<&'static str>,
}

impl ToneModel {
    fn new(fail_on: Option<&'static str>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl SpeechModel for ToneModel {
    fn kind(&self) -> TtsModelKind {
        TtsModelKind::Xtts
    }

    async fn tts_to_file(&self, request: &TtsRequest, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = self.fail_on {
            if request.text.contains(marker) {
                return Err(GermanizerError::Synthesis("voice model crashed".to_string()));
            }
        }

        let sample_rate = 22_050;
        let seconds = request.text.chars().count() as f64 * SECONDS_PER_CHAR;
        let frames = (seconds * sample_rate as f64).round() as usize;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(output, spec)?;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            writer.write_sample(((t * 220.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

fn orchestrator(model: Arc<ToneModel>, scratch: &ScratchDir) -> BatchOrchestrator {
    let config = SynthesisConfig {
        model: TtsModelKind::Xtts,
        voice: Some(Voice::Preset("Ana Florence".to_string())),
        use_gpu: false,
        language: "de".to_string(),
    };
    let synthesizer = Synthesizer::new(model, config, scratch.clone()).unwrap();
    let adjuster = DurationAdjuster::new(scratch.clone(), 24_000);
    BatchOrchestrator::new(SegmentGenerator::new(synthesizer, adjuster))
}

fn scratch_files(scratch: &ScratchDir) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(scratch.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn timed_batch_fits_every_segment_and_leaves_only_final_files() {
    let temp = TempDir::new().unwrap();
    let scratch = ScratchDir::new(temp.path().join("scratch")).unwrap();
    let model = Arc::new(ToneModel::new(None));
    let batch = orchestrator(Arc::clone(&model), &scratch);

    let texts = vec!["Hallo Welt.".to_string(), "Wie geht es dir?".to_string()];
    let targets = [2.0, 1.5];
    let report = batch.generate_batch_with_timing(&texts, &targets, 2).await.unwrap();

    assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.failures().count(), 0);

    let items = report.into_input_order();
    assert_eq!(items.len(), 2);

    let mut finals = Vec::new();
    for (item, target) in items.iter().zip(targets) {
        let artifact = item.artifact().expect("segment should succeed");
        assert!(artifact.duration <= target + TOLERANCE);
        assert!((measure_duration(&artifact.path).unwrap() - artifact.duration).abs() < 1e-9);
        finals.push(artifact.path.clone());
    }

    // 16 chars at 0.12s overran its 1.5s slot and had to be sped up
    assert!((items[1].artifact().unwrap().duration - 1.5).abs() <= TOLERANCE);

    finals.sort();
    assert_eq!(scratch_files(&scratch), finals);
}

#[tokio::test]
async fn failing_segment_is_reported_with_its_text() {
    let temp = TempDir::new().unwrap();
    let scratch = ScratchDir::new(temp.path().join("scratch")).unwrap();
    let model = Arc::new(ToneModel::new(Some("Fehler")));
    let batch = orchestrator(model, &scratch);

    let texts = vec![
        "Guten Morgen.".to_string(),
        "Hier passiert ein Fehler.".to_string(),
        "Auf Wiedersehen.".to_string(),
    ];
    let report = batch.generate_batch_with_timing(&texts, &[3.0, 3.0, 3.0], 3).await.unwrap();

    assert_eq!(report.artifacts().count(), 2);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 1);
    match &failures[0].outcome {
        ItemOutcome::Failed { reason } => assert!(reason.contains("Hier passiert ein Fehler.")),
        ItemOutcome::Completed(_) => unreachable!(),
    }
    assert_eq!(scratch_files(&scratch).len(), 2);
}

#[tokio::test]
async fn mismatched_lengths_never_call_the_model() {
    let temp = TempDir::new().unwrap();
    let scratch = ScratchDir::new(temp.path().join("scratch")).unwrap();
    let model = Arc::new(ToneModel::new(None));
    let batch = orchestrator(Arc::clone(&model), &scratch);

    let result = batch
        .generate_batch_with_timing(&["Eins.".to_string()], &[1.0, 2.0], 1)
        .await;

    assert!(matches!(result, Err(GermanizerError::BatchLengthMismatch { .. })));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}
