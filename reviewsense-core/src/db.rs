//! Database pool helpers and administrative schema management.
//!
//! Schema creation is idempotent and runs only via the explicit
//! `reviewsense-server --init-db` invocation, never on normal startup.

use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Create the `reviews` table and its indexes if they do not exist yet.
pub async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id BIGSERIAL PRIMARY KEY,
            review_text TEXT NOT NULL,
            sentiment VARCHAR(20) NOT NULL,
            sentiment_score DOUBLE PRECISION NOT NULL,
            key_points TEXT NOT NULL,
            key_points_error TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS reviews_created_at_idx ON reviews (created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS reviews_sentiment_idx ON reviews (sentiment)")
        .execute(pool)
        .await?;

    Ok(())
}
