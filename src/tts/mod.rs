// Speech synthesis
//
// A `SpeechModel` turns one piece of text into one WAV file. The `Synthesizer`
// owns the model handle for the whole run and decides how text reaches it:
// - Xtts: the whole segment in one call, cloned from a reference WAV
// - Legacy: sentence chunks under a character budget, joined afterwards

pub mod coqui;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::audio::concat_wavs;
use crate::config::{TtsConfig, TtsModelKind};
use crate::error::{GermanizerError, Result};
use crate::scratch::{ScratchDir, ScratchFile};
use crate::text::{clean_for_speech, split_into_chunks};

pub use coqui::CoquiModel;

/// Voice used for every segment of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Voice {
    /// WAV recording the voice-cloning model imitates
    Reference(PathBuf),
    /// Speaker identifier built into the model
    Preset(String),
}

impl Voice {
    /// Values ending in `.wav` are reference recordings, anything else is a preset name.
    pub fn parse(value: &str) -> Self {
        if value.to_lowercase().ends_with(".wav") {
            Voice::Reference(PathBuf::from(value))
        } else {
            Voice::Preset(value.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub model: TtsModelKind,
    pub voice: Option<Voice>,
    pub use_gpu: bool,
    pub language: String,
}

impl SynthesisConfig {
    /// Xtts without a configured voice clones `default_voice` when one is set.
    pub fn from_tts_config(config: &TtsConfig) -> Self {
        let voice = config.voice.as_deref().map(Voice::parse).or_else(|| match config.model {
            TtsModelKind::Xtts => config.default_voice.clone().map(Voice::Reference),
            TtsModelKind::Legacy => None,
        });

        Self {
            model: config.model,
            voice,
            use_gpu: config.use_gpu,
            language: config.language.clone(),
        }
    }
}

/// One model invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TtsRequest {
    pub text: String,
    pub voice: Option<Voice>,
    pub language: String,
}

/// A loaded text-to-speech model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechModel: Send + Sync {
    fn kind(&self) -> TtsModelKind;

    /// Synthesize `request.text` into the WAV file at `output`, replacing its contents.
    async fn tts_to_file(&self, request: &TtsRequest, output: &Path) -> Result<()>;

    async fn check_availability(&self) -> Result<()>;
}

/// Factory for speech model handles
pub struct SpeechModelFactory;

impl SpeechModelFactory {
    pub fn create_model(config: &TtsConfig) -> Arc<dyn SpeechModel> {
        Arc::new(CoquiModel::new(config))
    }

    /// Create the model and verify once that it can be invoked.
    pub async fn load(config: &TtsConfig) -> Result<Arc<dyn SpeechModel>> {
        let model = Self::create_model(config);
        model.check_availability().await?;
        info!("Speech model ready: {:?}", model.kind());
        Ok(model)
    }
}

/// Check that a voice reference exists and is a WAV file.
pub fn validate_reference_voice(path: &Path) -> Result<()> {
    let is_wav = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if !is_wav {
        return Err(GermanizerError::Synthesis(format!(
            "Reference voice must be a .wav file: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(GermanizerError::Synthesis(format!(
            "Reference voice not found: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Produces one scratch WAV per text using a model handle shared by all workers.
#[derive(Clone)]
pub struct Synthesizer {
    model: Arc<dyn SpeechModel>,
    config: SynthesisConfig,
    scratch: ScratchDir,
    chunk_chars: usize,
    call_gate: Option<Arc<Mutex<()>>>,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn SpeechModel>, config: SynthesisConfig, scratch: ScratchDir) -> Result<Self> {
        if model.kind() != config.model {
            return Err(GermanizerError::Config(format!(
                "Configured model {:?} does not match loaded model {:?}",
                config.model,
                model.kind()
            )));
        }

        match (config.model, &config.voice) {
            (TtsModelKind::Xtts, None) => {
                return Err(GermanizerError::Config(
                    "The xtts model needs a voice: a reference .wav, a preset speaker name or tts.default_voice"
                        .to_string(),
                ));
            }
            (TtsModelKind::Legacy, Some(Voice::Reference(path))) => {
                return Err(GermanizerError::Config(format!(
                    "The legacy model cannot clone voices; got reference {}",
                    path.display()
                )));
            }
            _ => {}
        }

        Ok(Self {
            model,
            config,
            scratch,
            chunk_chars: 250,
            call_gate: None,
        })
    }

    /// Character budget per legacy model call.
    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    /// Allow only one model invocation at a time across all clones.
    pub fn serialize_calls(mut self, serialize: bool) -> Self {
        self.call_gate = serialize.then(|| Arc::new(Mutex::new(())));
        self
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Synthesize `text` into a new scratch WAV that is deleted on drop unless kept.
    pub async fn synthesize(&self, text: &str) -> Result<ScratchFile> {
        let cleaned = clean_for_speech(text);
        if cleaned.is_empty() {
            return Err(GermanizerError::Synthesis("Nothing to synthesize".to_string()));
        }

        match self.config.model {
            TtsModelKind::Xtts => self.synthesize_single(&cleaned).await,
            TtsModelKind::Legacy => self.synthesize_chunked(&cleaned).await,
        }
    }

    async fn synthesize_single(&self, text: &str) -> Result<ScratchFile> {
        if let Some(Voice::Reference(path)) = &self.config.voice {
            validate_reference_voice(path)?;
        }

        let output = self.scratch.file("tts_", ".wav")?;
        self.invoke(text, &output).await?;
        Ok(output)
    }

    async fn synthesize_chunked(&self, text: &str) -> Result<ScratchFile> {
        let chunks = split_into_chunks(text, self.chunk_chars);
        debug!("Synthesizing {} chunks", chunks.len());

        let mut parts: Vec<ScratchFile> = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let part = self.scratch.file("tts_chunk_", ".wav")?;
            debug!("Chunk {}/{}: {} chars", i + 1, chunks.len(), chunk.chars().count());
            self.invoke(chunk, &part).await?;
            parts.push(part);
        }

        let combined = self.scratch.file("tts_", ".wav")?;
        let inputs: Vec<PathBuf> = parts.iter().map(|p| p.to_path_buf()).collect();
        let output = combined.to_path_buf();

        tokio::task::spawn_blocking(move || concat_wavs(&inputs, &output))
            .await
            .map_err(|e| GermanizerError::Synthesis(format!("Chunk concatenation task failed: {}", e)))?
            .map_err(|e| match e {
                GermanizerError::AudioFormat(msg) => {
                    GermanizerError::Synthesis(format!("Chunks disagree on audio format: {}", msg))
                }
                other => other,
            })?;

        Ok(combined)
    }

    async fn invoke(&self, text: &str, output: &Path) -> Result<()> {
        let request = TtsRequest {
            text: text.to_string(),
            voice: self.config.voice.clone(),
            language: self.config.language.clone(),
        };

        {
            let _guard = match &self.call_gate {
                Some(gate) => Some(gate.lock().await),
                None => None,
            };
            self.model.tts_to_file(&request, output).await?;
        }

        let written = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(GermanizerError::Synthesis(format!(
                "Model produced no audio for {}",
                output.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::write_tone;
    use crate::audio::{measure_duration, read_wav};
    use crate::config::Config;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records how many calls overlap while each one sleeps.
    #[derive(Default)]
    struct OverlapModel {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SpeechModel for OverlapModel {
        fn kind(&self) -> TtsModelKind {
            TtsModelKind::Legacy
        }

        async fn tts_to_file(&self, _request: &TtsRequest, output: &Path) -> Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            write_tone(output, 0.1, 24_000, 1);
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn check_availability(&self) -> Result<()> {
            Ok(())
        }
    }

    async fn peak_overlap(serialize: bool) -> usize {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(OverlapModel::default());
        let synthesizer = Synthesizer::new(model.clone(), legacy_config(), scratch_in(dir.path()))
            .unwrap()
            .serialize_calls(serialize);

        let calls = (0..4).map(|i| {
            let synthesizer = synthesizer.clone();
            async move { synthesizer.synthesize(&format!("Satz {}.", i)).await.unwrap() }
        });
        let outputs = futures::future::join_all(calls).await;
        assert_eq!(outputs.len(), 4);
        model.peak.load(Ordering::SeqCst)
    }

    fn scratch_in(dir: &Path) -> ScratchDir {
        ScratchDir::new(dir.join("scratch")).unwrap()
    }

    fn scratch_entries(scratch: &ScratchDir) -> usize {
        std::fs::read_dir(scratch.path()).unwrap().count()
    }

    fn legacy_config() -> SynthesisConfig {
        SynthesisConfig {
            model: TtsModelKind::Legacy,
            voice: None,
            use_gpu: false,
            language: "de".to_string(),
        }
    }

    fn tone_model(kind: TtsModelKind) -> MockSpeechModel {
        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(kind);
        model.expect_tts_to_file().returning(|_, output| {
            write_tone(output, 0.5, 24_000, 1);
            Ok(())
        });
        model
    }

    #[test]
    fn test_voice_parse() {
        assert_eq!(Voice::parse("speaker.WAV"), Voice::Reference(PathBuf::from("speaker.WAV")));
        assert_eq!(Voice::parse("Ana Florence"), Voice::Preset("Ana Florence".to_string()));
    }

    #[test]
    fn test_reference_voice_validation() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.wav");
        assert!(matches!(validate_reference_voice(&missing), Err(GermanizerError::Synthesis(_))));

        let mp3 = dir.path().join("voice.mp3");
        std::fs::write(&mp3, b"not a wav").unwrap();
        assert!(matches!(validate_reference_voice(&mp3), Err(GermanizerError::Synthesis(_))));

        let wav = dir.path().join("voice.wav");
        write_tone(&wav, 0.1, 24_000, 1);
        assert!(validate_reference_voice(&wav).is_ok());
    }

    #[test]
    fn test_construction_rejects_inconsistent_config() {
        let dir = tempfile::tempdir().unwrap();

        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(TtsModelKind::Xtts);
        let result = Synthesizer::new(Arc::new(model), legacy_config(), scratch_in(dir.path()));
        assert!(matches!(result, Err(GermanizerError::Config(_))));

        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(TtsModelKind::Xtts);
        let config = SynthesisConfig {
            model: TtsModelKind::Xtts,
            ..legacy_config()
        };
        let result = Synthesizer::new(Arc::new(model), config, scratch_in(dir.path()));
        assert!(matches!(result, Err(GermanizerError::Config(_))));
    }

    #[tokio::test]
    async fn test_xtts_single_shot_passes_reference_voice() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("speaker.wav");
        write_tone(&reference, 0.2, 22_050, 1);

        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(TtsModelKind::Xtts);
        let expected = reference.clone();
        model
            .expect_tts_to_file()
            .times(1)
            .withf(move |request, _| {
                request.text == "\"Hallo\" Welt."
                    && request.language == "de"
                    && request.voice == Some(Voice::Reference(expected.clone()))
            })
            .returning(|_, output| {
                write_tone(output, 0.8, 24_000, 1);
                Ok(())
            });

        let config = SynthesisConfig {
            model: TtsModelKind::Xtts,
            voice: Some(Voice::Reference(reference)),
            use_gpu: false,
            language: "de".to_string(),
        };
        let synthesizer = Synthesizer::new(Arc::new(model), config, scratch_in(dir.path())).unwrap();

        let output = synthesizer.synthesize("„Hallo“ Welt.").await.unwrap();
        assert!((measure_duration(&output).unwrap() - 0.8).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_xtts_missing_reference_is_synthesis_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(TtsModelKind::Xtts);
        model.expect_tts_to_file().never();

        let config = SynthesisConfig {
            model: TtsModelKind::Xtts,
            voice: Some(Voice::Reference(dir.path().join("gone.wav"))),
            use_gpu: false,
            language: "de".to_string(),
        };
        let synthesizer = Synthesizer::new(Arc::new(model), config, scratch_in(dir.path())).unwrap();

        let err = synthesizer.synthesize("Hallo.").await.unwrap_err();
        assert!(matches!(err, GermanizerError::Synthesis(_)));
        assert_eq!(scratch_entries(synthesizer.scratch()), 0);
    }

    #[tokio::test]
    async fn test_legacy_chunks_are_concatenated_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let model = tone_model(TtsModelKind::Legacy);
        let synthesizer = Synthesizer::new(Arc::new(model), legacy_config(), scratch_in(dir.path()))
            .unwrap()
            .with_chunk_chars(12);

        let output = synthesizer
            .synthesize("Erster Satz. Zweiter Satz. Dritter Satz.")
            .await
            .unwrap();

        let combined = read_wav(&output).unwrap();
        assert!((combined.duration_secs() - 1.5).abs() < 1e-3);
        assert_eq!(scratch_entries(synthesizer.scratch()), 1);
    }

    #[tokio::test]
    async fn test_legacy_failure_releases_earlier_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(TtsModelKind::Legacy);
        model.expect_tts_to_file().returning(|request, output| {
            if request.text.starts_with("Kaputt") {
                Err(GermanizerError::Synthesis("model crashed".to_string()))
            } else {
                write_tone(output, 0.5, 24_000, 1);
                Ok(())
            }
        });

        let synthesizer = Synthesizer::new(Arc::new(model), legacy_config(), scratch_in(dir.path()))
            .unwrap()
            .with_chunk_chars(12);

        let err = synthesizer
            .synthesize("Erster Satz. Zweiter Satz. Kaputt hier.")
            .await
            .unwrap_err();
        assert!(matches!(err, GermanizerError::Synthesis(msg) if msg.contains("model crashed")));
        assert_eq!(scratch_entries(synthesizer.scratch()), 0);
    }

    #[tokio::test]
    async fn test_legacy_chunk_format_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(TtsModelKind::Legacy);
        model.expect_tts_to_file().returning(|request, output| {
            let rate = if request.text.starts_with("Zweiter") { 16_000 } else { 22_050 };
            write_tone(output, 0.5, rate, 1);
            Ok(())
        });

        let synthesizer = Synthesizer::new(Arc::new(model), legacy_config(), scratch_in(dir.path()))
            .unwrap()
            .with_chunk_chars(12);

        let err = synthesizer.synthesize("Erster Satz. Zweiter Satz.").await.unwrap_err();
        assert!(matches!(err, GermanizerError::Synthesis(msg) if msg.contains("format")));
        assert_eq!(scratch_entries(synthesizer.scratch()), 0);
    }

    #[tokio::test]
    async fn test_empty_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(TtsModelKind::Legacy);
        model.expect_tts_to_file().returning(|_, _| Ok(()));

        let synthesizer = Synthesizer::new(Arc::new(model), legacy_config(), scratch_in(dir.path())).unwrap();
        let err = synthesizer.synthesize("Stille.").await.unwrap_err();
        assert!(matches!(err, GermanizerError::Synthesis(_)));
    }

    #[tokio::test]
    async fn test_blank_text_never_reaches_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = MockSpeechModel::new();
        model.expect_kind().return_const(TtsModelKind::Legacy);
        model.expect_tts_to_file().never();

        let synthesizer = Synthesizer::new(Arc::new(model), legacy_config(), scratch_in(dir.path())).unwrap();
        assert!(synthesizer.synthesize(" \u{0007} ").await.is_err());
    }

    #[tokio::test]
    async fn test_serialized_calls_never_overlap() {
        assert_eq!(peak_overlap(true).await, 1);
        assert!(peak_overlap(false).await > 1);
    }

    #[test]
    fn test_xtts_falls_back_to_default_voice() {
        let mut tts = Config::default().tts;
        tts.default_voice = Some(PathBuf::from("assets/default_german_voice.wav"));

        let config = SynthesisConfig::from_tts_config(&tts);
        assert_eq!(
            config.voice,
            Some(Voice::Reference(PathBuf::from("assets/default_german_voice.wav")))
        );

        tts.voice = Some("Ana Florence".to_string());
        let config = SynthesisConfig::from_tts_config(&tts);
        assert_eq!(config.voice, Some(Voice::Preset("Ana Florence".to_string())));

        tts.voice = None;
        tts.model = TtsModelKind::Legacy;
        assert_eq!(SynthesisConfig::from_tts_config(&tts).voice, None);
    }
}
