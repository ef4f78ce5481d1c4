//! Key-point extraction — Gemini generative backend with in-band degradation
//!
//! Sends a fixed instruction template embedding the review text to the Gemini
//! `generateContent` endpoint and returns the trimmed response. Failures never
//! escape this module: they are classified into a tagged
//! [`KeyPointsFailure`] whose user-facing warning text is persisted verbatim
//! in place of real key points, preserving the service's original wire shape.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default Gemini model when `GEMINI_MODEL_NAME` is unset. Carries the
/// legacy `models/` prefix; `GeminiConfig::model_id` strips it for the URL.
pub const DEFAULT_GEMINI_MODEL: &str = "models/gemini-1.5-flash-latest";

/// Default API version when `GEMINI_API_VERSION` is unset.
pub const DEFAULT_GEMINI_API_VERSION: &str = "v1beta";

// ============================================================================
// Configuration
// ============================================================================

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_version: String,
}

impl GeminiConfig {
    /// Read Gemini settings from the environment. A missing `GEMINI_API_KEY`
    /// yields an empty key; the caller decides whether that disables
    /// extraction (it is never fatal).
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            model: std::env::var("GEMINI_MODEL_NAME")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            api_version: std::env::var("GEMINI_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_GEMINI_API_VERSION.to_string()),
        }
    }

    /// Model identifier without the optional `models/` prefix some
    /// deployments configure.
    pub fn model_id(&self) -> &str {
        self.model.trim_start_matches("models/")
    }
}

// ============================================================================
// Errors and tagged degradation
// ============================================================================

#[derive(Error, Debug)]
pub enum KeyPointsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Empty response from generative backend")]
    EmptyResponse,

    #[error("Missing API key")]
    MissingApiKey,
}

/// Why extraction degraded. Carried alongside the stored warning text so the
/// persisted row can distinguish a degraded analysis from a genuine one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPointsFailure {
    MissingApiKey,
    QuotaExhausted { message: String },
    Other { message: String },
}

impl KeyPointsFailure {
    /// User-facing warning text, stored verbatim in place of real key points.
    pub fn user_message(&self) -> String {
        match self {
            KeyPointsFailure::MissingApiKey => {
                "⚠️ Gemini API key not configured. Please add GEMINI_API_KEY to .env file."
                    .to_string()
            }
            KeyPointsFailure::QuotaExhausted { .. } => {
                "⚠️ API quota exceeded. Please try again later.".to_string()
            }
            KeyPointsFailure::Other { message } => {
                format!("⚠️ Unable to extract key points: {message}")
            }
        }
    }

    /// Machine-readable reason for the `key_points_error` column.
    pub fn reason(&self) -> String {
        match self {
            KeyPointsFailure::MissingApiKey => "missing_api_key".to_string(),
            KeyPointsFailure::QuotaExhausted { message } => {
                format!("quota_exhausted: {message}")
            }
            KeyPointsFailure::Other { message } => format!("extraction_failed: {message}"),
        }
    }
}

/// Classify an extraction error by case-insensitive substring match on its
/// text, mirroring how the upstream error payloads spell these conditions.
pub fn classify_failure(err: &KeyPointsError) -> KeyPointsFailure {
    if matches!(err, KeyPointsError::MissingApiKey) {
        return KeyPointsFailure::MissingApiKey;
    }
    let message = err.to_string();
    let upper = message.to_uppercase();
    if upper.contains("API_KEY") || upper.contains("API KEY") {
        KeyPointsFailure::MissingApiKey
    } else if upper.contains("QUOTA") {
        KeyPointsFailure::QuotaExhausted { message }
    } else {
        KeyPointsFailure::Other { message }
    }
}

/// Extraction outcome: genuine bullets or a tagged degradation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPointsOutcome {
    Extracted(String),
    Degraded(KeyPointsFailure),
}

impl KeyPointsOutcome {
    /// Text persisted in the `key_points` column — real bullets, or the
    /// user-facing warning string on degradation.
    pub fn stored_text(&self) -> String {
        match self {
            KeyPointsOutcome::Extracted(text) => text.clone(),
            KeyPointsOutcome::Degraded(failure) => failure.user_message(),
        }
    }

    /// Machine-readable failure reason, `None` for genuine content.
    pub fn error_reason(&self) -> Option<String> {
        match self {
            KeyPointsOutcome::Extracted(_) => None,
            KeyPointsOutcome::Degraded(failure) => Some(failure.reason()),
        }
    }
}

// ============================================================================
// KeyPointExtractor trait
// ============================================================================

/// Abstraction over generative key-point backends. Injected at startup.
#[async_trait]
pub trait KeyPointExtractor: Send + Sync {
    /// Extract bullet-style key points for a review. Errors are classified
    /// into a degraded outcome by [`extract_key_points`].
    async fn extract(&self, review: &str) -> Result<String, KeyPointsError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Fixed instruction template requesting 3–5 concise bullet points.
pub fn build_prompt(review: &str) -> String {
    format!(
        "Analyze this product review and extract 3-5 key points in bullet format.\n\
         Be concise and focus on the most important aspects mentioned.\n\n\
         Review: {review}\n\n\
         Key Points:"
    )
}

/// Extract key points for `review`, absorbing every backend failure into a
/// tagged degraded outcome. Extraction never aborts the analysis pipeline.
pub async fn extract_key_points(
    extractor: &dyn KeyPointExtractor,
    review: &str,
) -> KeyPointsOutcome {
    match extractor.extract(review).await {
        Ok(text) => KeyPointsOutcome::Extracted(text.trim().to_string()),
        Err(e) => {
            tracing::warn!(
                backend = extractor.name(),
                error = %e,
                "Key-point extraction failed — storing warning text instead"
            );
            KeyPointsOutcome::Degraded(classify_failure(&e))
        }
    }
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiKeyPointClient
// ============================================================================

/// Gemini key-point client — calls the `generateContent` endpoint once per
/// review. No retries: a failed call degrades in-band.
#[derive(Debug, Clone)]
pub struct GeminiKeyPointClient {
    client: Client,
    config: GeminiConfig,
    base_url: String,
}

impl GeminiKeyPointClient {
    pub fn new(config: GeminiConfig) -> Result<Self, KeyPointsError> {
        let base_url = format!(
            "https://generativelanguage.googleapis.com/{}",
            config.api_version
        );
        Self::with_base_url(config, base_url)
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: GeminiConfig, base_url: String) -> Result<Self, KeyPointsError> {
        if config.api_key.is_empty() {
            return Err(KeyPointsError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn generate_once(&self, prompt: &str) -> Result<String, KeyPointsError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.config.model_id(),
            self.config.api_key
        );

        let request = GenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(KeyPointsError::Api { code, message });
        }

        let body: GenerateResponse = response.json().await?;

        let text: String = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(KeyPointsError::EmptyResponse);
        }

        Ok(text)
    }
}

#[async_trait]
impl KeyPointExtractor for GeminiKeyPointClient {
    async fn extract(&self, review: &str) -> Result<String, KeyPointsError> {
        let text = self.generate_once(&build_prompt(review)).await?;
        Ok(text.trim().to_string())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Stand-in extractor installed when `GEMINI_API_KEY` is absent. Every call
/// errors, which the pipeline absorbs as a configuration-warning payload.
#[derive(Debug, Clone, Default)]
pub struct DisabledKeyPointExtractor;

#[async_trait]
impl KeyPointExtractor for DisabledKeyPointExtractor {
    async fn extract(&self, _review: &str) -> Result<String, KeyPointsError> {
        Err(KeyPointsError::MissingApiKey)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

// ============================================================================
// TESTS
// ============================================================================
