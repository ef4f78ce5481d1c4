//! Sentiment classification — binary local model with three-way resolution
//!
//! Wraps an ONNX export of an SST-2 fine-tuned DistilBERT. The model only
//! knows positive/negative; low-confidence outputs resolve to `neutral`, and
//! a failed classification degrades to a neutral/0.5 sentinel instead of
//! aborting the request.

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Only this many leading characters of a review reach the model.
/// Known limitation: signal beyond this point is silently dropped.
pub const CLASSIFIER_INPUT_CHARS: usize = 512;

/// Binary confidence below this floor is not trusted — resolves to `neutral`.
pub const NEUTRAL_CONFIDENCE_FLOOR: f64 = 0.70;

/// Sentinel score recorded when classification itself fails.
pub const DEGRADED_SCORE: f64 = 0.5;

// ============================================================================
// Domain types
// ============================================================================

/// Three-way sentiment label assigned to a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Neutral => "neutral",
        }
    }

    /// Lenient parse used for query filters: lowercases and trims first,
    /// returns `None` for anything outside the three labels.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Some(SentimentLabel::Positive),
            "negative" => Some(SentimentLabel::Negative),
            "neutral" => Some(SentimentLabel::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The underlying model's binary opinion. There is no neutral class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryLabel {
    Positive,
    Negative,
}

/// Raw model output: binary label plus confidence in [0,1].
#[derive(Debug, Clone, Copy)]
pub struct RawClassification {
    pub label: BinaryLabel,
    pub confidence: f64,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("Model not found at {path} — run scripts/download-sentiment-model.sh to fetch it")]
    ModelNotFound { path: String },

    #[error("ONNX inference error: {0}")]
    Inference(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SentimentBackend trait
// ============================================================================

/// Abstraction over binary sentiment models. Injected into the orchestrator
/// at startup rather than held as process-global state.
#[async_trait]
pub trait SentimentBackend: Send + Sync {
    /// Classify the (already truncated) text into a raw binary result.
    async fn classify_raw(&self, text: &str) -> Result<RawClassification, SentimentError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Three-way resolution and degradation
// ============================================================================

/// Resolve a raw binary classification into the three-way label.
///
/// Below the confidence floor the binary opinion is not trusted and the
/// review is labeled `neutral`; the emitted score stays the raw confidence
/// either way, never rounded or clamped.
pub fn resolve_label(raw: &RawClassification) -> SentimentLabel {
    if raw.confidence < NEUTRAL_CONFIDENCE_FLOOR {
        return SentimentLabel::Neutral;
    }
    match raw.label {
        BinaryLabel::Positive => SentimentLabel::Positive,
        BinaryLabel::Negative => SentimentLabel::Negative,
    }
}

/// Classification outcome. `Degraded` keeps the failure reason so callers can
/// log or surface it; it still reads as neutral/0.5 for persistence.
#[derive(Debug, Clone)]
pub enum SentimentResult {
    Classified { label: SentimentLabel, score: f64 },
    Degraded { reason: String },
}

impl SentimentResult {
    pub fn label(&self) -> SentimentLabel {
        match self {
            SentimentResult::Classified { label, .. } => *label,
            SentimentResult::Degraded { .. } => SentimentLabel::Neutral,
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            SentimentResult::Classified { score, .. } => *score,
            SentimentResult::Degraded { .. } => DEGRADED_SCORE,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, SentimentResult::Degraded { .. })
    }
}

/// Truncate a review to the classifier's input window, respecting char
/// boundaries.
pub fn truncate_for_model(text: &str) -> &str {
    match text.char_indices().nth(CLASSIFIER_INPUT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Classify `text`, absorbing every backend failure into a degraded result.
/// Classification never aborts the analysis pipeline.
pub async fn classify(backend: &dyn SentimentBackend, text: &str) -> SentimentResult {
    match backend.classify_raw(truncate_for_model(text)).await {
        Ok(raw) => SentimentResult::Classified {
            label: resolve_label(&raw),
            score: raw.confidence,
        },
        Err(e) => {
            tracing::warn!(
                backend = backend.name(),
                error = %e,
                "Sentiment classification failed — falling back to neutral/0.5"
            );
            SentimentResult::Degraded {
                reason: e.to_string(),
            }
        }
    }
}

// ============================================================================
// ONNX classifier
// ============================================================================

/// ONNX classifier configuration (model + tokenizer file paths).
#[derive(Debug, Clone)]
pub struct OnnxClassifierConfig {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

/// Local binary sentiment classifier running an SST-2 DistilBERT ONNX export.
pub struct OnnxSentimentClassifier {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<tokenizers::Tokenizer>,
}

impl std::fmt::Debug for OnnxSentimentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSentimentClassifier").finish_non_exhaustive()
    }
}

impl OnnxSentimentClassifier {
    /// Load the ONNX model and tokenizer from the paths in `config`.
    /// Returns `SentimentError::ModelNotFound` if either file is missing.
    pub fn new(config: OnnxClassifierConfig) -> Result<Self, SentimentError> {
        if !config.model_path.exists() {
            return Err(SentimentError::ModelNotFound {
                path: config.model_path.display().to_string(),
            });
        }
        if !config.tokenizer_path.exists() {
            return Err(SentimentError::ModelNotFound {
                path: config.tokenizer_path.display().to_string(),
            });
        }

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| SentimentError::Inference(e.to_string()))?;

        let tokenizer = tokenizers::Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| SentimentError::Tokenizer(e.to_string()))?;

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
        })
    }
}

#[async_trait]
impl SentimentBackend for OnnxSentimentClassifier {
    async fn classify_raw(&self, text: &str) -> Result<RawClassification, SentimentError> {
        // ONNX inference is CPU-bound — run on the blocking thread pool.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut session_guard = session
                .lock()
                .map_err(|e| SentimentError::Inference(format!("session lock poisoned: {e}")))?;
            classify_sync(&mut session_guard, &tokenizer, &text)
        })
        .await
        .map_err(|e| SentimentError::Inference(format!("spawn_blocking join error: {e}")))?
    }

    fn name(&self) -> &str {
        "onnx-sst2"
    }
}

/// Run ONNX inference synchronously.
fn classify_sync(
    session: &mut Session,
    tokenizer: &tokenizers::Tokenizer,
    text: &str,
) -> Result<RawClassification, SentimentError> {
    // 1. Tokenize
    let encoding = tokenizer
        .encode(text, true)
        .map_err(|e| SentimentError::Tokenizer(e.to_string()))?;

    let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
    let attention_mask: Vec<i64> = encoding
        .get_attention_mask()
        .iter()
        .map(|&m| m as i64)
        .collect();

    let seq_len = input_ids.len();
    let shape = vec![1i64, seq_len as i64];

    // 2. Build input tensors via Tensor::from_array (batch_size=1).
    //    DistilBERT exports take input_ids + attention_mask only.
    let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids))
        .map_err(|e| SentimentError::Inference(e.to_string()))?;
    let attention_mask_tensor = Tensor::from_array((shape, attention_mask))
        .map_err(|e| SentimentError::Inference(e.to_string()))?;

    let inputs = ort::inputs! {
        "input_ids" => input_ids_tensor,
        "attention_mask" => attention_mask_tensor,
    };

    // 3. Run session
    let outputs = session
        .run(inputs)
        .map_err(|e| SentimentError::Inference(e.to_string()))?;

    // 4. Extract logits — expected shape [1, 2]: index 0 negative, 1 positive
    let (out_shape, logits) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| SentimentError::Inference(e.to_string()))?;

    if out_shape.len() != 2 || out_shape[1] != 2 {
        return Err(SentimentError::Inference(format!(
            "Expected [1, 2] logits, got {:?}",
            &out_shape[..]
        )));
    }

    Ok(raw_from_logits(logits[0], logits[1]))
}

/// Softmax over the two logits; label is the argmax, confidence the winning
/// probability.
fn raw_from_logits(negative: f32, positive: f32) -> RawClassification {
    let max = negative.max(positive);
    let e_neg = (negative - max).exp();
    let e_pos = (positive - max).exp();
    let p_pos = (e_pos / (e_neg + e_pos)) as f64;

    if p_pos >= 0.5 {
        RawClassification {
            label: BinaryLabel::Positive,
            confidence: p_pos,
        }
    } else {
        RawClassification {
            label: BinaryLabel::Negative,
            confidence: 1.0 - p_pos,
        }
    }
}

/// Stand-in backend installed when the model cannot be loaded. Every call
/// errors, which the pipeline absorbs as a degraded neutral/0.5 result.
#[derive(Debug, Clone)]
pub struct DisabledSentimentClassifier {
    reason: String,
}

impl DisabledSentimentClassifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SentimentBackend for DisabledSentimentClassifier {
    async fn classify_raw(&self, _text: &str) -> Result<RawClassification, SentimentError> {
        Err(SentimentError::Unavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

// ============================================================================
// Path resolution
// ============================================================================

/// Resolve the default model directory.
pub fn default_model_dir() -> PathBuf {
    let data_home = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share")
        });
    data_home.join("reviewsense/models")
}

/// Resolve paths for the ONNX model and tokenizer.
///
/// If `model_path` from config is empty, uses the default location.
pub fn resolve_model_paths(model_path: &str) -> (PathBuf, PathBuf) {
    if model_path.is_empty() {
        let dir = default_model_dir();
        (
            dir.join("distilbert-sst2.onnx"),
            dir.join("distilbert-sst2-tokenizer.json"),
        )
    } else {
        let model = PathBuf::from(model_path);
        let stem = model
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let tokenizer = model.with_file_name(format!("{stem}-tokenizer.json"));
        (model, tokenizer)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticBackend(RawClassification);

    #[async_trait]
    impl SentimentBackend for StaticBackend {
        async fn classify_raw(&self, _text: &str) -> Result<RawClassification, SentimentError> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl SentimentBackend for FailingBackend {
        async fn classify_raw(&self, _text: &str) -> Result<RawClassification, SentimentError> {
            Err(SentimentError::Inference("model exploded".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn raw(label: BinaryLabel, confidence: f64) -> RawClassification {
        RawClassification { label, confidence }
    }

    // --- three-way resolution ---

    #[test]
    fn test_low_confidence_resolves_neutral_regardless_of_label() {
        assert_eq!(
            resolve_label(&raw(BinaryLabel::Positive, 0.55)),
            SentimentLabel::Neutral
        );
        assert_eq!(
            resolve_label(&raw(BinaryLabel::Negative, 0.69)),
            SentimentLabel::Neutral
        );
    }

    #[test]
    fn test_floor_is_inclusive() {
        // Exactly 0.70 is trusted — only strictly-below falls to neutral.
        assert_eq!(
            resolve_label(&raw(BinaryLabel::Positive, 0.70)),
            SentimentLabel::Positive
        );
        assert_eq!(
            resolve_label(&raw(BinaryLabel::Negative, 0.70)),
            SentimentLabel::Negative
        );
    }

    #[test]
    fn test_high_confidence_keeps_binary_label() {
        assert_eq!(
            resolve_label(&raw(BinaryLabel::Positive, 0.95)),
            SentimentLabel::Positive
        );
        assert_eq!(
            resolve_label(&raw(BinaryLabel::Negative, 0.99)),
            SentimentLabel::Negative
        );
    }

    // --- classify() ---

    #[tokio::test]
    async fn test_classify_passes_score_through_exactly() {
        let backend = StaticBackend(raw(BinaryLabel::Positive, 0.95));
        let result = classify(&backend, "This product is absolutely wonderful and works great!")
            .await;
        assert_eq!(result.label(), SentimentLabel::Positive);
        assert_eq!(result.score(), 0.95);
        assert!(!result.is_degraded());
    }

    #[tokio::test]
    async fn test_classify_low_confidence_is_neutral_with_raw_score() {
        let backend = StaticBackend(raw(BinaryLabel::Positive, 0.55));
        let result = classify(&backend, "It's okay I guess, does the job.").await;
        assert_eq!(result.label(), SentimentLabel::Neutral);
        assert_eq!(result.score(), 0.55);
    }

    #[tokio::test]
    async fn test_classify_absorbs_backend_failure() {
        let result = classify(&FailingBackend, "anything at all").await;
        assert!(result.is_degraded());
        assert_eq!(result.label(), SentimentLabel::Neutral);
        assert_eq!(result.score(), DEGRADED_SCORE);
        match result {
            SentimentResult::Degraded { reason } => {
                assert!(reason.contains("model exploded"), "reason was: {reason}")
            }
            _ => panic!("Expected Degraded"),
        }
    }

    #[tokio::test]
    async fn test_disabled_classifier_degrades() {
        let backend = DisabledSentimentClassifier::new("model file missing");
        let result = classify(&backend, "a perfectly fine review").await;
        assert!(result.is_degraded());
        assert_eq!(result.label(), SentimentLabel::Neutral);
        assert_eq!(result.score(), 0.5);
    }

    // --- truncation ---

    #[test]
    fn test_truncate_short_text_unchanged() {
        let text = "short review";
        assert_eq!(truncate_for_model(text), text);
    }

    #[test]
    fn test_truncate_caps_at_512_chars() {
        let text = "a".repeat(600);
        assert_eq!(truncate_for_model(&text).chars().count(), 512);
    }

    #[test]
    fn test_truncate_respects_multibyte_boundaries() {
        let text = "é".repeat(600);
        let truncated = truncate_for_model(&text);
        assert_eq!(truncated.chars().count(), 512);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn test_truncate_exactly_512_unchanged() {
        let text = "b".repeat(512);
        assert_eq!(truncate_for_model(&text), text.as_str());
    }

    // --- logits → raw classification ---

    #[test]
    fn test_raw_from_logits_positive_wins() {
        let raw = raw_from_logits(-1.0, 3.0);
        assert_eq!(raw.label, BinaryLabel::Positive);
        assert!(raw.confidence > 0.9, "confidence was {}", raw.confidence);
    }

    #[test]
    fn test_raw_from_logits_negative_wins() {
        let raw = raw_from_logits(2.5, -2.5);
        assert_eq!(raw.label, BinaryLabel::Negative);
        assert!(raw.confidence > 0.9);
    }

    #[test]
    fn test_raw_from_logits_confidence_in_unit_interval() {
        let raw = raw_from_logits(0.1, 0.1);
        assert!(raw.confidence >= 0.5 && raw.confidence <= 1.0);
    }

    // --- labels ---

    #[test]
    fn test_label_parse_lenient() {
        assert_eq!(SentimentLabel::parse(" Positive "), Some(SentimentLabel::Positive));
        assert_eq!(SentimentLabel::parse("NEGATIVE"), Some(SentimentLabel::Negative));
        assert_eq!(SentimentLabel::parse("neutral"), Some(SentimentLabel::Neutral));
        assert_eq!(SentimentLabel::parse("angry"), None);
        assert_eq!(SentimentLabel::parse(""), None);
    }

    #[test]
    fn test_label_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SentimentLabel::Positive).unwrap(),
            "\"positive\""
        );
        assert_eq!(SentimentLabel::Neutral.to_string(), "neutral");
    }

    // --- model loading ---

    #[test]
    fn test_model_not_found_returns_error() {
        let config = OnnxClassifierConfig {
            model_path: PathBuf::from("/nonexistent/model.onnx"),
            tokenizer_path: PathBuf::from("/nonexistent/tokenizer.json"),
        };

        let result = OnnxSentimentClassifier::new(config);
        assert!(result.is_err());
        match result.unwrap_err() {
            SentimentError::ModelNotFound { path } => {
                assert!(path.contains("nonexistent"), "path was: {path}");
            }
            other => panic!("Expected ModelNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_model_paths_default() {
        let (model, tokenizer) = resolve_model_paths("");
        assert!(model.to_string_lossy().ends_with("distilbert-sst2.onnx"));
        assert!(tokenizer
            .to_string_lossy()
            .ends_with("distilbert-sst2-tokenizer.json"));
    }

    #[test]
    fn test_resolve_model_paths_custom() {
        let (model, tokenizer) = resolve_model_paths("/opt/models/custom.onnx");
        assert_eq!(model, PathBuf::from("/opt/models/custom.onnx"));
        assert_eq!(
            tokenizer,
            PathBuf::from("/opt/models/custom-tokenizer.json")
        );
    }
}
