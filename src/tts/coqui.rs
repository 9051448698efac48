use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::{SpeechModel, TtsRequest, Voice};
use crate::config::{TtsConfig, TtsModelKind};
use crate::error::{GermanizerError, Result};
use crate::media::MediaCommand;

/// Coqui TTS model driven through the `tts` command line tool.
#[derive(Debug, Clone)]
pub struct CoquiModel {
    binary_path: String,
    model_name: String,
    kind: TtsModelKind,
    use_gpu: bool,
}

impl CoquiModel {
    pub fn new(config: &TtsConfig) -> Self {
        let model_name = match config.model {
            TtsModelKind::Xtts => config.xtts_model_name.clone(),
            TtsModelKind::Legacy => config.legacy_model_name.clone(),
        };

        Self {
            binary_path: config.binary_path.clone(),
            model_name,
            kind: config.model,
            use_gpu: config.use_gpu,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn build_command(&self, request: &TtsRequest, output: &Path) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, format!("{} synthesis", self.model_name))
            .fail_as(GermanizerError::Synthesis)
            .arg("--text")
            .arg(request.text.as_str())
            .arg("--model_name")
            .arg(self.model_name.as_str())
            .path_arg("--out_path", output);

        cmd = match &request.voice {
            Some(Voice::Reference(path)) => cmd.path_arg("--speaker_wav", path),
            Some(Voice::Preset(name)) => cmd.arg("--speaker_idx").arg(name.as_str()),
            None => cmd,
        };

        // single-language models reject a language argument
        if self.kind == TtsModelKind::Xtts {
            cmd = cmd.arg("--language_idx").arg(request.language.as_str());
        }

        cmd.arg("--device").arg(if self.use_gpu { "cuda" } else { "cpu" })
    }
}

#[async_trait]
impl SpeechModel for CoquiModel {
    fn kind(&self) -> TtsModelKind {
        self.kind
    }

    async fn tts_to_file(&self, request: &TtsRequest, output: &Path) -> Result<()> {
        debug!("Synthesizing {} chars into {}", request.text.chars().count(), output.display());
        self.build_command(request, output).execute().await
    }

    async fn check_availability(&self) -> Result<()> {
        MediaCommand::new(&self.binary_path, "TTS availability check")
            .fail_as(GermanizerError::Synthesis)
            .arg("--help")
            .execute()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    fn request(voice: Option<Voice>) -> TtsRequest {
        TtsRequest {
            text: "Hallo Welt.".to_string(),
            voice,
            language: "de".to_string(),
        }
    }

    #[test]
    fn test_xtts_command_clones_reference_voice() {
        let config = Config::default().tts;
        let model = CoquiModel::new(&config);
        let cmd = model.build_command(
            &request(Some(Voice::Reference(PathBuf::from("me.wav")))),
            Path::new("out.wav"),
        );

        assert_eq!(cmd.binary_path, "tts");
        assert_eq!(
            cmd.args,
            vec![
                "--text",
                "Hallo Welt.",
                "--model_name",
                "tts_models/multilingual/multi-dataset/xtts_v2",
                "--out_path",
                "out.wav",
                "--speaker_wav",
                "me.wav",
                "--language_idx",
                "de",
                "--device",
                "cuda",
            ]
        );
    }

    #[test]
    fn test_legacy_command_uses_preset_and_no_language() {
        let config = TtsConfig {
            model: TtsModelKind::Legacy,
            use_gpu: false,
            ..Config::default().tts
        };
        let model = CoquiModel::new(&config);
        assert_eq!(model.model_name(), "tts_models/de/thorsten/tacotron2-DDC");

        let cmd = model.build_command(&request(Some(Voice::Preset("p1".to_string()))), Path::new("o.wav"));
        let joined = cmd.args.join(" ");
        assert!(joined.contains("--speaker_idx p1"));
        assert!(!joined.contains("--language_idx"));
        assert!(joined.ends_with("--device cpu"));
    }
}
