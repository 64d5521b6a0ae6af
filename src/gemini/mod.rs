//! Gemini generateContent adapter.
//!
//! One JSON-over-HTTPS request per analysis attempt, spaced by the shared
//! [`CallThrottle`]. Every expected failure — missing key, non-2xx status,
//! timeout, empty or unparseable body — surfaces as a [`GeminiError`] that
//! the pipeline converts into the heuristic fallback. Nothing here panics or
//! retries; the caller decides what a failure means.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::braindump::reconcile::ModelAnalysis;
use crate::config::GeminiConfig;
use crate::throttle::CallThrottle;

pub mod prompt;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("no gemini api key configured")]
    MissingKey,
    #[error("gemini returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("gemini request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gemini response contained no text")]
    EmptyResponse,
    #[error("gemini response was not the expected JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// generateContent response envelope. Any shape deviation is treated as an
/// empty response.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Client for the hosted generation API.
///
/// Cheaply cloneable; clones share the throttle schedule.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    throttle: CallThrottle,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let throttle = CallThrottle::new(Duration::from_millis(config.min_call_interval_ms));
        Self { config, throttle }
    }

    /// Whether a key is configured. Without one every call short-circuits to
    /// [`GeminiError::MissingKey`] and the pipeline runs heuristics only.
    pub fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    /// Run the braindump analysis prompt over the given parsed lines.
    pub async fn analyze(&self, lines: &[String]) -> Result<ModelAnalysis, GeminiError> {
        let prompt = prompt::build_analysis_prompt(lines);
        debug!(lines = lines.len(), model = %self.config.model, "requesting model analysis");
        self.generate_json(&prompt).await
    }

    /// Send one prompt and parse the returned text as `T`.
    ///
    /// Waits on the throttle before going out. The request carries the
    /// configured temperature, output-token bound, and hard timeout.
    pub async fn generate_json<T: serde::de::DeserializeOwned>(
        &self,
        prompt: &str,
    ) -> Result<T, GeminiError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(GeminiError::MissingKey)?;

        self.throttle.acquire().await;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model,
            key
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .build()?;

        let resp = client
            .post(&url)
            .json(&serde_json::json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": {
                    "temperature": self.config.temperature,
                    "maxOutputTokens": self.config.max_output_tokens,
                },
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeminiError::Status(status));
        }

        let envelope: GenerateResponse = resp.json().await?;
        let text = first_text(envelope).ok_or(GeminiError::EmptyResponse)?;
        let cleaned = strip_json_fences(&text);
        Ok(serde_json::from_str(&cleaned)?)
    }
}

/// Pull the first candidate's first text part out of the envelope.
fn first_text(envelope: GenerateResponse) -> Option<String> {
    envelope
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.trim().is_empty())
}

/// Strip markdown code fences from model output, if present.
fn strip_json_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(after_fence) = trimmed.strip_prefix("```") {
        let body = if let Some(nl) = after_fence.find('\n') {
            &after_fence[nl + 1..]
        } else {
            after_fence
        };
        let stripped = if let Some(end) = body.rfind("\n```") {
            &body[..end]
        } else {
            body.strip_suffix("```").unwrap_or(body)
        };
        return stripped.trim().to_string();
    }
    trimmed.to_string()
}
