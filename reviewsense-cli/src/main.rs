//! reviewsense-cli — command-line frontend for the ReviewSense analysis API
//!
//! # Subcommands
//! - `analyze <text> [--json]`                       — analyze and store one review
//! - `list [--sentiment <label>] [--limit <n>] [--json]` — list stored reviews
//! - `status`                                        — show server health

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "reviewsense-cli",
    version,
    about = "ReviewSense — product review sentiment analysis CLI"
)]
struct Cli {
    /// ReviewSense HTTP server URL (overrides REVIEWSENSE_HTTP_URL env var)
    #[arg(long, env = "REVIEWSENSE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a review and store the result
    Analyze {
        /// The review text (at least 10 characters)
        text: String,

        /// Output the stored record as raw JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored reviews, newest first
    List {
        /// Filter to one sentiment: positive, negative, or neutral
        #[arg(long)]
        sentiment: Option<String>,

        /// Return at most this many reviews
        #[arg(short = 'n', long)]
        limit: Option<u32>,

        /// Output the records as a raw JSON array
        #[arg(long)]
        json: bool,
    },

    /// Show ReviewSense server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// A stored review record from the ReviewSense HTTP API
#[derive(Debug, Deserialize)]
pub struct ReviewRecord {
    pub id: i64,
    pub review_text: String,
    pub sentiment: String,
    pub sentiment_score: f64,
    pub key_points: String,
    pub key_points_error: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

// ============================================================================
// Output formatting
// ============================================================================

/// Human-readable rendering of one stored review.
pub fn format_review(r: &ReviewRecord) -> String {
    let preview: String = r.review_text.chars().take(80).collect();
    let ellipsis = if r.review_text.chars().count() > 80 {
        "…"
    } else {
        ""
    };

    let mut out = format!(
        "#{} {} ({:.0}%)  {}\n  {}{}\n",
        r.id,
        r.sentiment,
        r.sentiment_score * 100.0,
        r.created_at.as_deref().unwrap_or("?"),
        preview,
        ellipsis,
    );

    for line in r.key_points.lines().filter(|l| !l.trim().is_empty()) {
        out.push_str("    ");
        out.push_str(line.trim());
        out.push('\n');
    }

    if let Some(reason) = &r.key_points_error {
        out.push_str(&format!("  (degraded: {})\n", reason));
    }

    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST one review to /api/analyze-review and print the stored record.
fn do_analyze(server: &str, text: &str, json_output: bool) -> anyhow::Result<()> {
    let client = http_client(60)?;

    let url = format!("{}/api/analyze-review", server);
    let body = serde_json::json!({ "review_text": text });

    let resp = match client.post(&url).json(&body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("reviewsense-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let message = resp
            .json::<ErrorBody>()
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_default();
        eprintln!("reviewsense-cli: server returned {}: {}", status, message);
        std::process::exit(1);
    }

    if json_output {
        let value: serde_json::Value = resp.json()?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let record: ReviewRecord = match resp.json() {
            Ok(r) => r,
            Err(e) => {
                eprintln!("reviewsense-cli: failed to parse response: {}", e);
                std::process::exit(1);
            }
        };
        print!("{}", format_review(&record));
    }

    Ok(())
}

/// GET /api/reviews with optional filter and limit, and print the records.
fn do_list(
    server: &str,
    sentiment: Option<&str>,
    limit: Option<u32>,
    json_output: bool,
) -> anyhow::Result<()> {
    let client = http_client(30)?;

    let url = format!("{}/api/reviews", server);
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(s) = sentiment {
        query.push(("sentiment", s.to_string()));
    }
    if let Some(n) = limit {
        query.push(("limit", n.to_string()));
    }

    let resp = match client.get(&url).query(&query).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("reviewsense-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("reviewsense-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    if json_output {
        let value: serde_json::Value = resp.json()?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let records: Vec<ReviewRecord> = match resp.json() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("reviewsense-cli: failed to parse response: {}", e);
            std::process::exit(1);
        }
    };

    if records.is_empty() {
        eprintln!("No reviews stored yet");
        return Ok(());
    }

    for record in &records {
        println!("{}", format_review(record));
    }

    Ok(())
}

/// Show the server status by calling GET /api/health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = http_client(10)?;

    let url = format!("{}/api/health", server);
    let resp = client.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!(
                "ReviewSense server: {}",
                body["status"].as_str().unwrap_or("unknown")
            );
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("reviewsense-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("reviewsense-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Analyze { text, json } => do_analyze(&server, &text, json),
        Commands::List {
            sentiment,
            limit,
            json,
        } => do_list(&server, sentiment.as_deref(), limit, json),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("reviewsense-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_record(id: i64, sentiment: &str, score: f64, text: &str) -> ReviewRecord {
        ReviewRecord {
            id,
            review_text: text.to_string(),
            sentiment: sentiment.to_string(),
            sentiment_score: score,
            key_points: "- point one\n- point two".to_string(),
            key_points_error: None,
            created_at: Some("2026-08-23T10:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_format_review_header_fields() {
        let record = mock_record(12, "positive", 0.95, "Great phone, love the camera.");
        let out = format_review(&record);

        assert!(out.starts_with("#12 positive (95%)"), "out was: {out}");
        assert!(out.contains("Great phone, love the camera."));
        assert!(out.contains("- point one"));
        assert!(out.contains("- point two"));
        assert!(!out.contains("degraded"));
    }

    #[test]
    fn test_format_review_truncates_long_text() {
        let long_text = "A".repeat(200);
        let record = mock_record(1, "neutral", 0.55, &long_text);
        let out = format_review(&record);

        assert!(out.contains(&"A".repeat(80)));
        assert!(!out.contains(&"A".repeat(81)));
        assert!(out.contains('…'));
    }

    #[test]
    fn test_format_review_shows_degradation_reason() {
        let mut record = mock_record(3, "neutral", 0.5, "The box arrived dented but fine.");
        record.key_points =
            "⚠️ API quota exceeded. Please try again later.".to_string();
        record.key_points_error = Some("quota_exhausted: 429".to_string());
        let out = format_review(&record);

        assert!(out.contains("(degraded: quota_exhausted: 429)"));
        assert!(out.contains("⚠️ API quota exceeded."));
    }

    #[test]
    fn test_format_review_missing_timestamp_renders_placeholder() {
        let mut record = mock_record(4, "negative", 0.88, "Broke after one week of use.");
        record.created_at = None;
        let out = format_review(&record);

        assert!(out.contains("(88%)  ?"), "out was: {out}");
    }

    #[test]
    fn test_record_parses_api_json_shape() {
        let json = serde_json::json!({
            "id": 7,
            "review_text": "Solid value for the price.",
            "sentiment": "positive",
            "sentiment_score": 0.93,
            "key_points": "- good value",
            "key_points_error": null,
            "created_at": "2026-08-23T09:30:00Z"
        });

        let record: ReviewRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.sentiment, "positive");
        assert_eq!(record.sentiment_score, 0.93);
        assert!(record.key_points_error.is_none());
    }
}
