use thiserror::Error;

#[derive(Error, Debug)]
pub enum GermanizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Duration adjustment error: {0}")]
    Adjustment(String),

    #[error("Incompatible audio format: {0}")]
    AudioFormat(String),

    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("Segment \"{snippet}\" failed: {source}")]
    SegmentFailed {
        snippet: String,
        #[source]
        source: Box<GermanizerError>,
    },

    #[error("Batch input mismatch: {texts} texts but {durations} target durations")]
    BatchLengthMismatch { texts: usize, durations: usize },

    #[error("Video download error: {0}")]
    Download(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

pub type Result<T> = std::result::Result<T, GermanizerError>;
