use std::sync::Arc;

use clap::Parser;
use reviewsense_core::keypoints::{DisabledKeyPointExtractor, GeminiConfig, GeminiKeyPointClient};
use reviewsense_core::sentiment::{
    resolve_model_paths, DisabledSentimentClassifier, OnnxClassifierConfig,
    OnnxSentimentClassifier, SentimentBackend,
};
use reviewsense_core::{KeyPointExtractor, ReviewAnalyzer, ReviewsenseConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use reviewsense_server::http;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "reviewsense.toml")]
    config: String,

    /// Check database connectivity and exit
    #[arg(long)]
    health: bool,

    /// Create the reviews table if absent, then exit (idempotent)
    #[arg(long)]
    init_db: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Init logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Load config (file optional — every section has defaults)
    let mut config = match ReviewsenseConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // DATABASE_URL is the one required setting
    config.database.url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL is not set. Export it or add it to a .env file.");
            std::process::exit(1);
        }
    };

    // Connect to DB
    let pool = match reviewsense_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match reviewsense_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ ReviewSense DB health check passed");
        return Ok(());
    }

    if args.init_db {
        match reviewsense_core::db::create_schema(&pool).await {
            Ok(()) => {
                println!("✅ reviews table ready");
                return Ok(());
            }
            Err(e) => {
                println!("❌ Schema creation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Sentiment backend — a load failure installs a stand-in so requests
    // degrade to neutral/0.5 instead of failing
    let (model_path, tokenizer_path) = resolve_model_paths(&config.classifier.model_path);
    let sentiment: Arc<dyn SentimentBackend> =
        match OnnxSentimentClassifier::new(OnnxClassifierConfig {
            model_path,
            tokenizer_path,
        }) {
            Ok(classifier) => Arc::new(classifier),
            Err(e) => {
                tracing::warn!(
                    "Sentiment classifier unavailable ({}); requests will degrade to neutral/0.5",
                    e
                );
                Arc::new(DisabledSentimentClassifier::new(e.to_string()))
            }
        };

    // Key-point backend — absent GEMINI_API_KEY disables extraction, not fatal
    let gemini = GeminiConfig::from_env();
    let keypoints: Arc<dyn KeyPointExtractor> = if gemini.api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set. Key point extraction will be disabled.");
        Arc::new(DisabledKeyPointExtractor)
    } else {
        match GeminiKeyPointClient::new(gemini) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::warn!("Gemini client init failed ({}); key point extraction disabled", e);
                Arc::new(DisabledKeyPointExtractor)
            }
        }
    };

    let analyzer = ReviewAnalyzer::new(sentiment, keypoints);

    // Graceful shutdown on Ctrl+C
    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(pool, config, analyzer, tx.subscribe()).await?;

    Ok(())
}
