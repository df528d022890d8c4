//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! Sensitive values wrapped in secrecy::SecretString to prevent log leaks.
//! Pipeline tuning (staleness window, poll intervals) comes from an
//! optional TOML file, see [`pipeline`].

pub mod pipeline;

pub use pipeline::{PipelineSettings, PollSettings};

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::path::PathBuf;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    /// Base URL of the serverless functions, e.g. `https://xyz.example.co/functions/v1`.
    pub functions_url: String,
    pub service_role_key: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Path to the pipeline TOML file. None = built-in defaults.
    pub pipeline_config: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let functions_url = required_var("FUNCTIONS_URL")?;
        if !functions_url.starts_with("http://") && !functions_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "FUNCTIONS_URL must be an http(s) URL, got {functions_url}"
            )));
        }

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            functions_url: functions_url.trim_end_matches('/').to_string(),
            service_role_key: SecretString::from(required_var("SERVICE_ROLE_KEY")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            pipeline_config: std::env::var("PIPELINE_CONFIG").ok().map(PathBuf::from),
        })
    }

    /// Pipeline settings from `PIPELINE_CONFIG`, or defaults when unset.
    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        match &self.pipeline_config {
            Some(path) => PipelineSettings::load(path),
            None => Ok(PipelineSettings::default()),
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}
