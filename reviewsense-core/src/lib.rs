pub mod analyzer;
pub mod config;
pub mod db;
pub mod keypoints;
pub mod models;
pub mod sentiment;

pub use analyzer::{ReviewAnalysis, ReviewAnalyzer};
pub use config::ReviewsenseConfig;
pub use keypoints::{
    extract_key_points, DisabledKeyPointExtractor, GeminiConfig, GeminiKeyPointClient,
    KeyPointExtractor, KeyPointsError, KeyPointsFailure, KeyPointsOutcome,
};
pub use models::Review;
pub use sentiment::{
    classify, DisabledSentimentClassifier, OnnxClassifierConfig, OnnxSentimentClassifier,
    SentimentBackend, SentimentError, SentimentLabel, SentimentResult,
    CLASSIFIER_INPUT_CHARS, DEGRADED_SCORE, NEUTRAL_CONFIDENCE_FLOOR,
};
