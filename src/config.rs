use std::{env, path::PathBuf};

use anyhow::{Context, Result, anyhow};

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_TOKEN_STORE_PATH: &str = "storage/session.json";
const DEFAULT_PORT: u16 = 8080;

/// Process-wide settings resolved from the environment (after `.env` is loaded).
#[derive(Clone, Debug)]
pub struct Settings {
    api_base_url: String,
    token_store_path: PathBuf,
    port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let api_base_url = match env::var("PHARMACY_API_URL") {
            Ok(value) => normalize_base_url(&value)?,
            Err(_) => DEFAULT_API_URL.to_string(),
        };

        let token_store_path = env::var("TOKEN_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_STORE_PATH));

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got `{raw}`"))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            api_base_url,
            token_store_path,
            port,
        })
    }

    #[cfg(test)]
    pub fn for_tests(token_store_path: impl Into<PathBuf>) -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            token_store_path: token_store_path.into(),
            port: DEFAULT_PORT,
        }
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn token_store_path(&self) -> &PathBuf {
        &self.token_store_path
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(anyhow!("PHARMACY_API_URL is set but empty"));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(anyhow!(
            "PHARMACY_API_URL must start with http:// or https://, got `{trimmed}`"
        ));
    }
    Ok(trimmed.to_string())
}
