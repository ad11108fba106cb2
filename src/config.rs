//! Environment-sourced configuration, loaded once at process start.
//! Missing required values are a fatal startup error.

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_GIGACHAT_SCOPE: &str = "GIGACHAT_API_PERS";
pub const DEFAULT_DATABASE_PATH: &str = "neurochef.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub gigachat_client_id: String,
    pub gigachat_client_secret: String,
    pub gigachat_scope: String,
    pub database_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN must be set")?,
            gigachat_client_id: env::var("GIGACHAT_CLIENT_ID")
                .context("GIGACHAT_CLIENT_ID must be set")?,
            gigachat_client_secret: env::var("GIGACHAT_CLIENT_SECRET")
                .context("GIGACHAT_CLIENT_SECRET must be set")?,
            gigachat_scope: env::var("GIGACHAT_SCOPE")
                .unwrap_or_else(|_| DEFAULT_GIGACHAT_SCOPE.to_string()),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Loads the whole config in one test: env vars are process-global and
    // parallel mutation would race.
    #[test]
    fn test_from_env_reads_values_and_defaults() {
        env::set_var("TELEGRAM_BOT_TOKEN", "tok");
        env::set_var("GIGACHAT_CLIENT_ID", "cid");
        env::set_var("GIGACHAT_CLIENT_SECRET", "sec");
        env::remove_var("GIGACHAT_SCOPE");
        env::remove_var("DATABASE_PATH");

        let config = Config::from_env().unwrap();
        assert_eq!(config.telegram_bot_token, "tok");
        assert_eq!(config.gigachat_client_id, "cid");
        assert_eq!(config.gigachat_client_secret, "sec");
        assert_eq!(config.gigachat_scope, DEFAULT_GIGACHAT_SCOPE);
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);

        env::remove_var("TELEGRAM_BOT_TOKEN");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));

        env::remove_var("GIGACHAT_CLIENT_ID");
        env::remove_var("GIGACHAT_CLIENT_SECRET");
    }
}
