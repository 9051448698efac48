use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Translator;
use crate::config::TranslateConfig;
use crate::error::{GermanizerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub response: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub text: String,
}

/// Translator backed by an Ollama `/api/generate` endpoint
pub struct OllamaTranslator {
    client: Client,
    config: TranslateConfig,
}

impl OllamaTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(300)).build()?;
        Ok(Self { client, config })
    }

    /// Fail early when the server is down or the model has not been pulled.
    pub async fn check_model(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.config.endpoint);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| GermanizerError::Translation(format!("Ollama unreachable at {}: {}", self.config.endpoint, e)))?;

        if !response.status().is_success() {
            return Err(GermanizerError::Translation(format!(
                "Ollama at {} answered {}",
                self.config.endpoint,
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| GermanizerError::Translation(format!("Unexpected model list: {}", e)))?;

        if !model_is_pulled(&tags, &self.config.model) {
            return Err(GermanizerError::Translation(format!(
                "Ollama model '{}' is not pulled; run: ollama pull {}",
                self.config.model, self.config.model
            )));
        }
        info!("Ollama model '{}' is available", self.config.model);
        Ok(())
    }

    /// One request with JSON-formatted output
    async fn translate_once(&self, text: &str, target_language: &str, context: Option<&str>) -> Result<String> {
        let request = TranslationRequest {
            model: self.config.model.clone(),
            prompt: build_translation_prompt(text, target_language, context),
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        debug!("Sending translation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GermanizerError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GermanizerError::Translation(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let translation_response: TranslationResponse = response
            .json()
            .await
            .map_err(|e| GermanizerError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw_response = translation_response.response.trim();
        debug!("Raw Ollama response: {}", raw_response);

        if raw_response.is_empty() {
            return Err(GermanizerError::Translation("Empty translation received".to_string()));
        }

        if let Ok(result) = serde_json::from_str::<TranslationResult>(raw_response) {
            return Ok(result.text.trim().to_string());
        }

        Ok(clean_translation_response(raw_response))
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    async fn translate(&self, text: &str, target_language: &str, context: Option<&str>) -> Result<String> {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.translate_once(text, target_language, context).await {
                Ok(translation) => return Ok(translation),
                Err(e) => {
                    warn!("Translation attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| GermanizerError::Translation("No attempts made".to_string())))
    }
}

/// Build translation prompt with context, using JSON format
fn build_translation_prompt(text: &str, target_language: &str, context: Option<&str>) -> String {
    let language_name = language_code_to_name(target_language);

    let mut prompt = format!(
        "You are a professional translator for video dubbing.\n\
         \n\
         CRITICAL: You must translate the text to {} ONLY. Do not translate to any other language.\n\
         The target language is: {} (language code: {})\n\
         Keep the translation about as long as the source so it can be spoken in the same time.\n\
         \n\
         Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
         Do not include any explanations, alternatives, or text in other languages.\n\
         \n\
         [Text to translate]\n\
         {}\n\
         \n",
        language_name, language_name, target_language, language_name, text
    );

    if let Some(ctx) = context.filter(|ctx| !ctx.trim().is_empty()) {
        prompt.push_str(&format!(
            "[Context for reference - DO NOT translate this part]\n\
             {}\n\n\
             Remember: Only translate the text in the [Text to translate] section above to {}.\n",
            ctx, language_name
        ));
    }

    prompt
}

/// Convert language code to full language name for clearer prompts
fn language_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "de" => "German".to_string(),
        "en" => "English".to_string(),
        "fr" => "French".to_string(),
        "es" => "Spanish".to_string(),
        "it" => "Italian".to_string(),
        "pt" => "Portuguese".to_string(),
        "nl" => "Dutch".to_string(),
        "pl" => "Polish".to_string(),
        "ru" => "Russian".to_string(),
        "tr" => "Turkish".to_string(),
        "ja" => "Japanese".to_string(),
        "ko" => "Korean".to_string(),
        "zh" => "Chinese".to_string(),
        "ar" => "Arabic".to_string(),
        "hi" => "Hindi".to_string(),
        _ => code.to_string(),
    }
}

/// Pick the translation line out of a chatty, non-JSON response
fn clean_translation_response(response: &str) -> String {
    let lines: Vec<&str> = response.lines().map(str::trim).collect();

    let is_chatter = |line: &str| {
        line.starts_with("Here are")
            || line.starts_with("Here is")
            || line.starts_with("Option")
            || line.starts_with("**Option")
            || line.starts_with("Translation:")
            || line.starts_with("- ")
            || line.starts_with("* ")
            || (line.starts_with("**") && line.ends_with("**"))
    };

    if let Some(line) = lines
        .iter()
        .find(|line| !line.is_empty() && !is_chatter(line) && line.chars().count() > 3)
    {
        return line.to_string();
    }

    lines
        .iter()
        .find(|line| !line.is_empty())
        .map(|line| line.to_string())
        .unwrap_or_else(|| response.to_string())
}

/// Ollama `/api/tags` response
#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    pub models: Vec<LocalModel>,
}

#[derive(Debug, Deserialize)]
pub struct LocalModel {
    pub name: String,
}

/// Whether `wanted` is among the pulled models. A name without a tag means `:latest`.
pub fn model_is_pulled(tags: &TagsResponse, wanted: &str) -> bool {
    let with_tag = |name: &str| {
        if name.contains(':') {
            name.to_string()
        } else {
            format!("{}:latest", name)
        }
    };
    let wanted = with_tag(wanted);
    tags.models.iter().any(|model| with_tag(&model.name) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_target_language_and_context() {
        let prompt = build_translation_prompt("Good morning.", "de", Some("It is early."));
        assert!(prompt.contains("to German ONLY"));
        assert!(prompt.contains("Good morning."));
        assert!(prompt.contains("[Context for reference - DO NOT translate this part]\nIt is early."));

        let without = build_translation_prompt("Good morning.", "de", Some("   "));
        assert!(!without.contains("[Context"));
    }

    #[test]
    fn test_language_names() {
        assert_eq!(language_code_to_name("DE"), "German");
        assert_eq!(language_code_to_name("xx"), "xx");
    }

    #[test]
    fn test_clean_translation_response_skips_chatter() {
        let response = "Here is the translation:\n\n**German**\nGuten Morgen, wie geht's?\n- alternative";
        assert_eq!(clean_translation_response(response), "Guten Morgen, wie geht's?");
        assert_eq!(clean_translation_response("\n Ja \n"), "Ja");
    }

    #[test]
    fn test_translation_result_json() {
        let result: TranslationResult = serde_json::from_str(r#"{"text":" Hallo Welt. "}"#).unwrap();
        assert_eq!(result.text.trim(), "Hallo Welt.");
    }

    #[test]
    fn test_model_lookup_treats_missing_tag_as_latest() {
        let tags: TagsResponse = serde_json::from_str(
            r#"{"models":[{"name":"llama3.2:3b","size":1},{"name":"mistral:latest"}]}"#,
        )
        .unwrap();

        assert!(model_is_pulled(&tags, "llama3.2:3b"));
        assert!(model_is_pulled(&tags, "mistral"));
        assert!(!model_is_pulled(&tags, "llama3.2"));
        assert!(!model_is_pulled(&tags, "qwen2:7b"));
    }
}
