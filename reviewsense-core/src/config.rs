use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Service configuration loaded from an optional TOML file.
///
/// Secrets and deployment-specific settings come from the environment instead:
/// `DATABASE_URL` (required), `GEMINI_API_KEY` / `GEMINI_MODEL_NAME` /
/// `GEMINI_API_VERSION` (optional, see `keypoints::GeminiConfig::from_env`).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ReviewsenseConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Filled from the `DATABASE_URL` environment variable at startup;
    /// the file never carries credentials.
    #[serde(default)]
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClassifierConfig {
    /// Path to the ONNX sentiment model. Empty means the default location
    /// under the XDG data directory (see `sentiment::resolve_model_paths`).
    #[serde(default)]
    pub model_path: String,
}

impl ReviewsenseConfig {
    /// Load configuration from `path`. The file is optional — every section
    /// has defaults, so a missing file yields a fully usable config.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .build()?;
        s.try_deserialize()
    }
}
