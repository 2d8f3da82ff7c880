use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::GeminiSettings;

use super::{Reading, ReadingFuture, ReadingSource};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

const READING_PROMPT: &str = r#"You are an ancient, mystical astrologer.
Generate a short, cryptic, but ultimately encouraging "cosmic reading" or horoscope for the current moment.
The output should be JSON with two keys: "title" (a short mystical title, e.g., "The Whispering Comet") and "prophecy" (the reading, max 60 words).
Do not use markdown blocks. Return only the JSON string."#;

/// Error bodies beyond this are cut before they reach the log.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Reading source backed by the Gemini `generateContent` endpoint.
pub struct GeminiReadingSource {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiReadingSource {
    pub fn new(settings: &GeminiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .context("failed to build Gemini HTTP client")?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    async fn fetch(&self) -> Result<Reading> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no Gemini API key configured"))?;

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": READING_PROMPT }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let error_text: String = error_text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            bail!("Gemini returned {status}: {error_text}");
        }

        let data: GenerateContentResponse = response
            .json()
            .await
            .context("Gemini response was not valid JSON")?;

        let text = data.text().unwrap_or_else(|| "{}".to_string());
        parse_reading(&text)
    }
}

impl ReadingSource for GeminiReadingSource {
    fn request_reading(&self) -> ReadingFuture<'_> {
        Box::pin(async move {
            match self.fetch().await {
                Ok(reading) => {
                    log_info!("received reading \"{}\"", reading.title);
                    reading
                }
                Err(err) => {
                    log_error!("Gemini connection failed: {err:?}");
                    Reading::fallback()
                }
            }
        })
    }
}

/// Parses the model output into a reading, tolerating a surrounding markdown fence.
pub fn parse_reading(text: &str) -> Result<Reading> {
    let trimmed = strip_code_fence(text.trim());
    let reading: Reading =
        serde_json::from_str(trimmed).context("reading payload is not a {title, prophecy} object")?;

    if reading.title.trim().is_empty() || reading.prophecy.trim().is_empty() {
        bail!("reading payload has an empty title or prophecy");
    }

    Ok(Reading {
        title: reading.title.trim().to_string(),
        prophecy: reading.prophecy.trim().to_string(),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
