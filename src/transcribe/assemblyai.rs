use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::{TranscriptSegment, Transcriber, TranscriptionMapper};
use crate::config::TranscriberConfig;
use crate::error::{GermanizerError, Result};

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
    language_code: &'a str,
    punctuate: bool,
    format_text: bool,
    speaker_labels: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    speakers_expected: Option<u32>,
}

impl<'a> TranscriptRequest<'a> {
    /// Diarization is always on; a speaker count is only sent when above one.
    fn new(audio_url: &'a str, language_code: &'a str, speakers_expected: Option<u32>) -> Self {
        Self {
            audio_url,
            language_code,
            punctuate: true,
            format_text: true,
            speaker_labels: true,
            speakers_expected: speakers_expected.filter(|n| *n > 1),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptStatus {
    id: String,
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// AssemblyAI `/transcript/{id}/sentences` response
#[derive(Debug, Deserialize)]
pub struct SentencesResponse {
    pub sentences: Vec<Sentence>,
}

/// Sentence with millisecond offsets
#[derive(Debug, Deserialize)]
pub struct Sentence {
    pub text: String,
    pub start: u64,
    pub end: u64,
}

pub struct AssemblyAiMapper;

impl TranscriptionMapper<SentencesResponse> for AssemblyAiMapper {
    fn to_segments(response: SentencesResponse) -> Result<Vec<TranscriptSegment>> {
        let segments: Vec<TranscriptSegment> = response
            .sentences
            .into_iter()
            .map(|s| TranscriptSegment {
                text: s.text.trim().to_string(),
                start: s.start as f64 / 1000.0,
                end: s.end as f64 / 1000.0,
            })
            .filter(|s| !s.text.is_empty())
            .collect();

        if segments.is_empty() {
            return Err(GermanizerError::Transcription("Transcript contains no sentences".to_string()));
        }
        Ok(segments)
    }
}

/// AssemblyAI REST client: upload, request a transcript, poll, fetch sentences.
pub struct AssemblyAiTranscriber {
    client: Client,
    config: TranscriberConfig,
    api_key: String,
}

impl AssemblyAiTranscriber {
    pub fn new(config: TranscriberConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = Client::builder().timeout(Duration::from_secs(300)).build()?;

        Ok(Self { client, config, api_key })
    }

    async fn upload(&self, audio_path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(audio_path).await?;
        info!("Uploading {} ({} bytes)", audio_path.display(), bytes.len());

        let response = self
            .client
            .post(format!("{}/upload", self.config.endpoint))
            .header("authorization", &self.api_key)
            .body(bytes)
            .send()
            .await?;
        let upload: UploadResponse = check(response, "Upload").await?.json().await?;
        Ok(upload.upload_url)
    }

    async fn request_transcript(&self, audio_url: &str, language: &str) -> Result<String> {
        let request = TranscriptRequest::new(audio_url, language, self.config.speakers_expected);
        if let Some(speakers) = request.speakers_expected {
            info!("Speaker diarization expects {} speakers", speakers);
        }

        let response = self
            .client
            .post(format!("{}/transcript", self.config.endpoint))
            .header("authorization", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let status: TranscriptStatus = check(response, "Transcript request").await?.json().await?;
        debug!("Transcript {} queued ({})", status.id, status.status);
        Ok(status.id)
    }

    async fn wait_for_completion(&self, id: &str) -> Result<()> {
        let url = format!("{}/transcript/{}", self.config.endpoint, id);

        for attempt in 1..=self.config.max_polls {
            let response = self.client.get(&url).header("authorization", &self.api_key).send().await?;
            let status: TranscriptStatus = check(response, "Status poll").await?.json().await?;

            match status.status.as_str() {
                "completed" => {
                    info!("Transcript {} completed", id);
                    return Ok(());
                }
                "error" => {
                    return Err(GermanizerError::Transcription(
                        status.error.unwrap_or_else(|| "Transcription failed".to_string()),
                    ));
                }
                other => debug!("Transcript {} is {} (poll {})", id, other, attempt),
            }

            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
        }

        Err(GermanizerError::Transcription(format!(
            "Transcript {} not finished after {} polls",
            id, self.config.max_polls
        )))
    }

    async fn fetch_sentences(&self, id: &str) -> Result<Vec<TranscriptSegment>> {
        let response = self
            .client
            .get(format!("{}/transcript/{}/sentences", self.config.endpoint, id))
            .header("authorization", &self.api_key)
            .send()
            .await?;
        let sentences: SentencesResponse = check(response, "Sentence fetch").await?.json().await?;
        AssemblyAiMapper::to_segments(sentences)
    }
}

#[async_trait]
impl Transcriber for AssemblyAiTranscriber {
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<TranscriptSegment>> {
        let audio_url = self.upload(audio_path).await?;
        let id = self.request_transcript(&audio_url, language).await?;
        self.wait_for_completion(&id).await?;

        let segments = self.fetch_sentences(&id).await?;
        info!("Transcribed {} segments", segments.len());
        Ok(segments)
    }
}

async fn check(response: reqwest::Response, step: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(GermanizerError::Transcription(format!("{} failed with {}: {}", step, status, body)))
}
