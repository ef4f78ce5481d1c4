use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted review analysis. Created exactly once by the analyze-review
/// flow and never updated afterwards.
///
/// `key_points` holds either genuine extracted bullets or a user-facing
/// warning string when extraction degraded; `key_points_error` carries the
/// machine-readable failure reason in that case (NULL for genuine content).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub review_text: String,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub key_points: String,
    pub key_points_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
