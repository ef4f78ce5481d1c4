//! Review store — single-table persistence for analysis results.
//!
//! Each call is one atomic statement; the pool scopes the connection to the
//! call and returns it on every exit path, including errors.

use reviewsense_core::analyzer::ReviewAnalysis;
use reviewsense_core::models::Review;
use reviewsense_core::sentiment::SentimentLabel;
use sqlx::{PgPool, Postgres, QueryBuilder};

const REVIEW_COLUMNS: &str =
    "id, review_text, sentiment, sentiment_score, key_points, key_points_error, created_at";

/// Insert one analyzed review and return the stored row with its generated
/// id and timestamp.
pub async fn insert_review(
    pool: &PgPool,
    review_text: &str,
    analysis: &ReviewAnalysis,
) -> Result<Review, sqlx::Error> {
    let sql = format!(
        "INSERT INTO reviews (review_text, sentiment, sentiment_score, key_points, key_points_error) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {REVIEW_COLUMNS}"
    );

    sqlx::query_as::<_, Review>(&sql)
        .bind(review_text)
        .bind(analysis.sentiment.as_str())
        .bind(analysis.sentiment_score)
        .bind(analysis.key_points.stored_text())
        .bind(analysis.key_points.error_reason())
        .fetch_one(pool)
        .await
}

/// List reviews newest-first, optionally filtered to one sentiment label and
/// capped to the first `limit` rows. `id DESC` breaks ties between rows
/// created within the same timestamp tick.
pub async fn list_reviews(
    pool: &PgPool,
    sentiment: Option<SentimentLabel>,
    limit: Option<i64>,
) -> Result<Vec<Review>, sqlx::Error> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {REVIEW_COLUMNS} FROM reviews"));

    if let Some(label) = sentiment {
        query.push(" WHERE sentiment = ").push_bind(label.as_str());
    }

    query.push(" ORDER BY created_at DESC, id DESC");

    if let Some(n) = limit {
        query.push(" LIMIT ").push_bind(n);
    }

    query.build_query_as::<Review>().fetch_all(pool).await
}
