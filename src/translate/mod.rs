// Translation of transcript segments into the dubbing language.
//
// - Ollama: local LLM translation with JSON-formatted responses

pub mod ollama;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::transcribe::TranscriptSegment;
use crate::error::Result;

pub use ollama::OllamaTranslator;

/// Main trait for translation operations
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_language`; `context` is surrounding text for reference only
    async fn translate(&self, text: &str, target_language: &str, context: Option<&str>) -> Result<String>;
}

/// Translate every segment, keeping timings. A segment whose translation fails keeps its source text.
pub async fn translate_segments(
    translator: &dyn Translator,
    segments: &[TranscriptSegment],
    target_language: &str,
) -> Vec<TranscriptSegment> {
    let mut translated = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let context = surrounding_text(segments, i);
        let text = match translator.translate(&segment.text, target_language, Some(&context)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("Empty translation for segment {}, keeping source text", i);
                segment.text.clone()
            }
            Err(e) => {
                warn!("Translation of segment {} failed, keeping source text: {}", i, e);
                segment.text.clone()
            }
        };

        translated.push(TranscriptSegment {
            text,
            start: segment.start,
            end: segment.end,
        });
    }

    info!("Translated {} segments to {}", translated.len(), target_language);
    translated
}

/// Previous and next segment text, joined.
fn surrounding_text(segments: &[TranscriptSegment], index: usize) -> String {
    let before = index.checked_sub(1).and_then(|i| segments.get(i));
    let after = segments.get(index + 1);
    before
        .into_iter()
        .chain(after)
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
