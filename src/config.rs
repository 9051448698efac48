use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, GermanizerError};

// Defaults for fields added after the first config format
fn default_output_sample_rate() -> u32 {
    24_000
}

fn default_legacy_chunk_chars() -> usize {
    250
}

fn default_max_kept() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub tts: TtsConfig,
    pub batch: BatchConfig,
    pub scratch: ScratchConfig,
    pub media: MediaConfig,
    pub download: DownloadConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Path to the Coqui `tts` command line tool
    pub binary_path: String,
    /// Which speech model to load
    pub model: TtsModelKind,
    /// Model name for the voice-cloning model
    pub xtts_model_name: String,
    /// Model name for the legacy single-speaker model
    pub legacy_model_name: String,
    /// Language code passed to multilingual models
    pub language: String,
    /// Reference WAV (xtts) or speaker preset (legacy)
    pub voice: Option<String>,
    /// Reference WAV the xtts model falls back to when no voice is given
    #[serde(default)]
    pub default_voice: Option<PathBuf>,
    /// Run the model on the GPU when available
    pub use_gpu: bool,
    /// Frame rate every sped-up segment is re-encoded to
    #[serde(default = "default_output_sample_rate")]
    pub output_sample_rate: u32,
    /// Character budget per legacy model call
    #[serde(default = "default_legacy_chunk_chars")]
    pub legacy_chunk_chars: usize,
    /// Allow only one model invocation at a time
    #[serde(default)]
    pub serialize_model_calls: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsModelKind {
    /// Xtts: multilingual voice-cloning model driven by a reference WAV
    Xtts,
    /// Legacy: German single-speaker model, chunked synthesis with preset voices
    Legacy,
}

impl TtsModelKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "xtts" => Ok(Self::Xtts),
            "legacy" | "tacotron2" => Ok(Self::Legacy),
            _ => Err(GermanizerError::Config(format!(
                "Invalid TTS model '{}'. Valid models: xtts, legacy",
                value
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of segments synthesized concurrently
    pub max_workers: usize,
    /// Draw a progress bar over submitted segments
    pub show_progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchConfig {
    /// Directory holding intermediate audio and downloads
    pub dir: PathBuf,
    /// Keep the scratch directory after a run
    pub keep: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Sample rate of the audio extracted from the source video
    pub extract_sample_rate: u32,
    /// AAC bitrate of the dubbed audio track
    pub audio_bitrate: String,
    /// Additional options appended to the mux command
    pub mux_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Path to yt-dlp binary
    pub binary_path: String,
    /// Format selectors tried in order until one succeeds
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// AssemblyAI API base URL
    pub endpoint: String,
    /// API key; falls back to ASSEMBLYAI_API_KEY
    pub api_key: Option<String>,
    /// Seconds between status polls
    pub poll_interval_secs: u64,
    /// Give up after this many polls
    pub max_polls: u32,
    /// Speaker count hint for diarization
    #[serde(default)]
    pub speakers_expected: Option<u32>,
}

impl TranscriberConfig {
    pub fn resolve_api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("ASSEMBLYAI_API_KEY").ok())
            .ok_or_else(|| GermanizerError::Config(
                "AssemblyAI API key missing. Set transcriber.api_key or ASSEMBLYAI_API_KEY".to_string(),
            ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    /// Maximum retries for failed translations
    pub max_retries: u32,
    /// Target language code
    pub target_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Dubbed videos kept in the output directory after a run; 0 keeps all
    #[serde(default = "default_max_kept")]
    pub max_kept: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_kept: default_max_kept(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tts: TtsConfig {
                binary_path: "tts".to_string(),
                model: TtsModelKind::Xtts,
                xtts_model_name: "tts_models/multilingual/multi-dataset/xtts_v2".to_string(),
                legacy_model_name: "tts_models/de/thorsten/tacotron2-DDC".to_string(),
                language: "de".to_string(),
                voice: None,
                default_voice: None,
                use_gpu: true,
                output_sample_rate: default_output_sample_rate(),
                legacy_chunk_chars: default_legacy_chunk_chars(),
                serialize_model_calls: false,
            },
            batch: BatchConfig {
                max_workers: 4,
                show_progress: true,
            },
            scratch: ScratchConfig {
                dir: PathBuf::from("processing_files/temp"),
                keep: false,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                extract_sample_rate: 44_100,
                audio_bitrate: "192k".to_string(),
                mux_options: Vec::new(),
            },
            download: DownloadConfig {
                binary_path: "yt-dlp".to_string(),
                formats: vec![
                    "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
                    "bestvideo+bestaudio/best".to_string(),
                    "best".to_string(),
                ],
            },
            transcriber: TranscriberConfig {
                endpoint: "https://api.assemblyai.com/v2".to_string(),
                api_key: None,
                poll_interval_secs: 3,
                max_polls: 600,
                speakers_expected: None,
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                max_retries: 3,
                target_language: "de".to_string(),
            },
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GermanizerError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| GermanizerError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| GermanizerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| GermanizerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("germanizer.toml");

        let config = Config::default();
        config.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();

        assert_eq!(loaded.tts.model, TtsModelKind::Xtts);
        assert_eq!(loaded.tts.output_sample_rate, 24_000);
        assert_eq!(loaded.batch.max_workers, 4);
        assert_eq!(loaded.download.formats.len(), 3);
    }

    #[test]
    fn test_missing_optional_tts_fields_use_defaults() {
        let mut value = toml::Value::try_from(Config::default()).unwrap();
        let tts = value.get_mut("tts").unwrap().as_table_mut().unwrap();
        tts.remove("output_sample_rate");
        tts.remove("legacy_chunk_chars");
        tts.remove("serialize_model_calls");

        let config: Config = toml::from_str(&toml::to_string(&value).unwrap()).unwrap();
        assert_eq!(config.tts.output_sample_rate, 24_000);
        assert_eq!(config.tts.legacy_chunk_chars, 250);
        assert!(!config.tts.serialize_model_calls);
    }

    #[test]
    fn test_missing_output_section_keeps_ten_videos() {
        let mut value = toml::Value::try_from(Config::default()).unwrap();
        value.as_table_mut().unwrap().remove("output");
        value.get_mut("transcriber").unwrap().as_table_mut().unwrap().remove("speakers_expected");

        let config: Config = toml::from_str(&toml::to_string(&value).unwrap()).unwrap();
        assert_eq!(config.output.max_kept, 10);
        assert_eq!(config.transcriber.speakers_expected, None);
        assert_eq!(config.tts.default_voice, None);
    }

    #[test]
    fn test_parse_model_kind() {
        assert_eq!(TtsModelKind::parse("XTTS").unwrap(), TtsModelKind::Xtts);
        assert_eq!(TtsModelKind::parse("tacotron2").unwrap(), TtsModelKind::Legacy);
        assert!(TtsModelKind::parse("bark").is_err());
    }
}
