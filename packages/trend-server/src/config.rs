use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub dataforseo_login: String,
    pub dataforseo_password: String,
    /// Full URL the provider posts results back to.
    pub callback_url: String,
    /// When absent the demand classifier is disabled (fail-open).
    pub openai_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            dataforseo_login: env::var("DATAFORSEO_LOGIN")
                .context("DATAFORSEO_LOGIN must be set")?,
            dataforseo_password: env::var("DATAFORSEO_PASSWORD")
                .context("DATAFORSEO_PASSWORD must be set")?,
            callback_url: env::var("CALLBACK_URL").context("CALLBACK_URL must be set")?,
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
        })
    }
}
