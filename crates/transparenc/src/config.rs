// transparenc/crates/transparenc/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default number of documents requested from the retrieval endpoint.
pub const DEFAULT_TOP_K: u8 = 2;
/// Largest `top_k` the frontend offers.
pub const MAX_TOP_K: u8 = 9;

const DEFAULT_API_ENDPOINT: &str = "http://127.0.0.1:8000";
const DEFAULT_DATA_DIR: &str = "./.transparenc";
const DEFAULT_PDF_BASE_URL: &str = "https://ncsu-sg.s3.us-east-1.amazonaws.com";
const DATABASE_FILE: &str = "chat_history.db";
const LOCAL_STORAGE_FILE: &str = "local_storage.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the retrieval / streaming API, without a trailing slash.
    pub api_endpoint: String,
    pub data_dir: PathBuf,
    pub default_top_k: u8,
    pub request_timeout_seconds: u64,
    pub pdf_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            default_top_k: DEFAULT_TOP_K,
            request_timeout_seconds: 600,
            pdf_base_url: DEFAULT_PDF_BASE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        // NEXT_PUBLIC_API_ENDPOINT is accepted as a fallback name.
        let api_endpoint = env::var("API_ENDPOINT")
            .or_else(|_| env::var("NEXT_PUBLIC_API_ENDPOINT"))
            .unwrap_or_else(|_| DEFAULT_API_ENDPOINT.into());

        let default_top_k: u8 = env::var("DEFAULT_TOP_K")
            .unwrap_or_else(|_| DEFAULT_TOP_K.to_string())
            .parse()
            .context("DEFAULT_TOP_K must be a number between 1 and 9")?;

        let config = Self {
            api_endpoint: Self::normalize_endpoint(&api_endpoint)?,
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into())),
            default_top_k: Self::clamp_top_k(default_top_k),
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "600".into())
                .parse()
                .context("REQUEST_TIMEOUT_SECONDS must be a whole number of seconds")?,
            pdf_base_url: env::var("PDF_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_PDF_BASE_URL.into()),
        };

        Ok(config)
    }

    /// Overrides the API endpoint, validating it the same way `from_env` does.
    pub fn with_api_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.api_endpoint = Self::normalize_endpoint(endpoint)?;
        Ok(self)
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    fn normalize_endpoint(raw: &str) -> Result<String> {
        let trimmed = raw.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "API endpoint must start with http:// or https://, got '{}'",
                raw
            ));
        }
        Ok(trimmed.to_string())
    }

    pub fn clamp_top_k(top_k: u8) -> u8 {
        top_k.clamp(1, MAX_TOP_K)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn local_storage_path(&self) -> PathBuf {
        self.data_dir.join(LOCAL_STORAGE_FILE)
    }

    pub fn doc_retrieval_url(&self) -> String {
        format!("{}/doc-retrieval/", self.api_endpoint)
    }

    pub fn claude_stream_url(&self) -> String {
        format!("{}/claude-stream", self.api_endpoint)
    }

    pub fn document_pdf_url(&self, doc_id: &str) -> String {
        format!("{}/{}.pdf", self.pdf_base_url, doc_id)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- API Endpoint: {}", self.api_endpoint);
        info!("- Data Directory: {}", self.data_dir.display());
        info!("- Default top_k: {}", self.default_top_k);
        info!("- Request Timeout: {}s", self.request_timeout_seconds);
        info!("- PDF Base URL: {}", self.pdf_base_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            api_endpoint: "http://127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from("/tmp/transparenc-test"),
            default_top_k: 2,
            request_timeout_seconds: 600,
            pdf_base_url: "https://ncsu-sg.s3.us-east-1.amazonaws.com".to_string(),
        }
    }

    // ===== Endpoint Tests =====

    #[test]
    fn test_endpoint_urls() {
        let config = create_test_config();

        assert_eq!(config.doc_retrieval_url(), "http://127.0.0.1:8000/doc-retrieval/");
        assert_eq!(config.claude_stream_url(), "http://127.0.0.1:8000/claude-stream");
    }

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let config = create_test_config()
            .with_api_endpoint("https://api.example.org/")
            .unwrap();

        assert_eq!(config.api_endpoint, "https://api.example.org");
        assert_eq!(config.claude_stream_url(), "https://api.example.org/claude-stream");
    }

    #[test]
    fn test_endpoint_without_scheme_is_rejected() {
        let result = create_test_config().with_api_endpoint("api.example.org");
        assert!(result.is_err());
    }

    // ===== top_k Tests =====

    #[test]
    fn test_clamp_top_k() {
        assert_eq!(Config::clamp_top_k(0), 1);
        assert_eq!(Config::clamp_top_k(4), 4);
        assert_eq!(Config::clamp_top_k(42), MAX_TOP_K);
    }

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.default_top_k, DEFAULT_TOP_K);
        assert!(config.api_endpoint.starts_with("http://"));
        assert!(config.request_timeout_seconds > 0);
    }

    // ===== Path Tests =====

    #[test]
    fn test_storage_paths_live_in_data_dir() {
        let config = create_test_config().with_data_dir("/var/lib/transparenc");

        assert_eq!(config.database_path(), PathBuf::from("/var/lib/transparenc/chat_history.db"));
        assert_eq!(
            config.local_storage_path(),
            PathBuf::from("/var/lib/transparenc/local_storage.json")
        );
    }

    #[test]
    fn test_document_pdf_url() {
        let config = create_test_config();
        assert_eq!(
            config.document_pdf_url("R29"),
            "https://ncsu-sg.s3.us-east-1.amazonaws.com/R29.pdf"
        );
    }
}
