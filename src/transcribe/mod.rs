// Speech-to-text behind a trait.
//
// To add a new transcription service:
// 1. Create service-specific data structures for parsing its JSON
// 2. Implement TranscriptionMapper for them
// 3. Add the service to TranscriberImplementation and the factory

pub mod assemblyai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::TranscriberConfig;
use crate::error::Result;

pub use assemblyai::AssemblyAiTranscriber;

/// One transcribed sentence with its position in the source audio, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl TranscriptSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Converts a service-specific response into ordered transcript segments
pub trait TranscriptionMapper<T> {
    fn to_segments(service_result: T) -> Result<Vec<TranscriptSegment>>;
}

/// Main trait for transcription operations
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `audio_path` spoken in `language` into ordered segments
    async fn transcribe(&self, audio_path: &Path, language: &str) -> Result<Vec<TranscriptSegment>>;
}

#[derive(Debug, Clone)]
pub enum TranscriberImplementation {
    AssemblyAi,
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(
        implementation: TranscriberImplementation,
        config: TranscriberConfig,
    ) -> Result<Box<dyn Transcriber>> {
        match implementation {
            TranscriberImplementation::AssemblyAi => Ok(Box::new(AssemblyAiTranscriber::new(config)?)),
        }
    }

    pub fn create_default(config: TranscriberConfig) -> Result<Box<dyn Transcriber>> {
        Self::create_transcriber(TranscriberImplementation::AssemblyAi, config)
    }
}
