use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::llm_client::{DEFAULT_API_BASE, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    /// Total attempts per Gemini call. 1 means no retry.
    pub gemini_max_attempts: u32,
    pub upload_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let gemini_max_attempts = optional_env("GEMINI_MAX_ATTEMPTS", "1")
            .parse::<u32>()
            .context("GEMINI_MAX_ATTEMPTS must be a positive integer")?;
        if gemini_max_attempts == 0 {
            anyhow::bail!("GEMINI_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_model: optional_env("GEMINI_MODEL", DEFAULT_MODEL),
            gemini_api_base: optional_env("GEMINI_API_BASE", DEFAULT_API_BASE),
            gemini_max_attempts,
            upload_dir: PathBuf::from(optional_env("UPLOAD_DIR", "uploads")),
            port: optional_env("PORT", "5000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
