//! Review analysis orchestrator — sequences the two adapters.
//!
//! Both sub-calls are total (they degrade in-band rather than error), so
//! `analyze` is pure composition with no failure branch of its own.

use std::sync::Arc;

use crate::keypoints::{extract_key_points, KeyPointExtractor, KeyPointsOutcome};
use crate::sentiment::{classify, SentimentBackend, SentimentLabel};

/// Merged analysis result, ready for persistence.
#[derive(Debug, Clone)]
pub struct ReviewAnalysis {
    pub sentiment: SentimentLabel,
    pub sentiment_score: f64,
    pub key_points: KeyPointsOutcome,
}

/// Holds the injected backend handles. Constructed once at startup; the
/// handles are read-only afterwards and safe to share across requests.
#[derive(Clone)]
pub struct ReviewAnalyzer {
    sentiment: Arc<dyn SentimentBackend>,
    keypoints: Arc<dyn KeyPointExtractor>,
}

impl ReviewAnalyzer {
    pub fn new(
        sentiment: Arc<dyn SentimentBackend>,
        keypoints: Arc<dyn KeyPointExtractor>,
    ) -> Self {
        Self {
            sentiment,
            keypoints,
        }
    }

    /// Run classification, then key-point extraction, and merge the results.
    /// The order is not semantically required but is fixed for determinism.
    pub async fn analyze(&self, review_text: &str) -> ReviewAnalysis {
        let sentiment = classify(self.sentiment.as_ref(), review_text).await;
        let key_points = extract_key_points(self.keypoints.as_ref(), review_text).await;

        ReviewAnalysis {
            sentiment: sentiment.label(),
            sentiment_score: sentiment.score(),
            key_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::{DisabledKeyPointExtractor, KeyPointsError, KeyPointsFailure};
    use crate::sentiment::{
        BinaryLabel, DisabledSentimentClassifier, RawClassification, SentimentError,
    };
    use async_trait::async_trait;

    struct StaticClassifier(RawClassification);

    #[async_trait]
    impl SentimentBackend for StaticClassifier {
        async fn classify_raw(&self, _text: &str) -> Result<RawClassification, SentimentError> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct StaticExtractor(String);

    #[async_trait]
    impl KeyPointExtractor for StaticExtractor {
        async fn extract(&self, _review: &str) -> Result<String, KeyPointsError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    fn analyzer(raw: RawClassification, bullets: &str) -> ReviewAnalyzer {
        ReviewAnalyzer::new(
            Arc::new(StaticClassifier(raw)),
            Arc::new(StaticExtractor(bullets.to_string())),
        )
    }

    #[tokio::test]
    async fn test_analyze_merges_confident_positive() {
        let analyzer = analyzer(
            RawClassification {
                label: BinaryLabel::Positive,
                confidence: 0.95,
            },
            "- wonderful\n- works great",
        );

        let result = analyzer
            .analyze("This product is absolutely wonderful and works great!")
            .await;

        assert_eq!(result.sentiment, SentimentLabel::Positive);
        assert_eq!(result.sentiment_score, 0.95);
        assert_eq!(
            result.key_points,
            KeyPointsOutcome::Extracted("- wonderful\n- works great".to_string())
        );
    }

    #[tokio::test]
    async fn test_analyze_low_confidence_reads_neutral() {
        let analyzer = analyzer(
            RawClassification {
                label: BinaryLabel::Positive,
                confidence: 0.55,
            },
            "- does the job",
        );

        let result = analyzer.analyze("It's okay I guess, does the job.").await;

        assert_eq!(result.sentiment, SentimentLabel::Neutral);
        assert_eq!(result.sentiment_score, 0.55);
    }

    #[tokio::test]
    async fn test_analyze_never_fails_when_both_backends_are_down() {
        let analyzer = ReviewAnalyzer::new(
            Arc::new(DisabledSentimentClassifier::new("no model")),
            Arc::new(DisabledKeyPointExtractor),
        );

        let result = analyzer.analyze("Everything is broken today.").await;

        assert_eq!(result.sentiment, SentimentLabel::Neutral);
        assert_eq!(result.sentiment_score, 0.5);
        assert_eq!(
            result.key_points,
            KeyPointsOutcome::Degraded(KeyPointsFailure::MissingApiKey)
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_does_not_affect_sentiment() {
        let analyzer = ReviewAnalyzer::new(
            Arc::new(StaticClassifier(RawClassification {
                label: BinaryLabel::Negative,
                confidence: 0.88,
            })),
            Arc::new(DisabledKeyPointExtractor),
        );

        let result = analyzer.analyze("Terrible quality, broke within a week.").await;

        assert_eq!(result.sentiment, SentimentLabel::Negative);
        assert_eq!(result.sentiment_score, 0.88);
        assert!(matches!(result.key_points, KeyPointsOutcome::Degraded(_)));
    }
}
