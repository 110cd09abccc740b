use anyhow::{Context, Result};
use std::env;

#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub github_app_id: u64,
    pub github_webhook_secret: String,
    /// The login our own review requests are attributed to. Must match the
    /// app slug, or the self-feedback guard rejects our own echoes.
    pub bot_login: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token =
            env::var("GITHUB_TOKEN").context("GITHUB_TOKEN environment variable is required")?;

        let github_app_id = env::var("GITHUB_APP_ID")
            .context("GITHUB_APP_ID environment variable is required")?
            .parse::<u64>()
            .context("GITHUB_APP_ID must be a valid number")?;

        let github_webhook_secret = env::var("GITHUB_WEBHOOK_SECRET")
            .context("GITHUB_WEBHOOK_SECRET environment variable is required")?;

        let bot_login = env::var("BOT_LOGIN").unwrap_or_else(|_| "reviewbot[bot]".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        Ok(Config {
            github_token,
            github_app_id,
            github_webhook_secret,
            bot_login,
            port,
        })
    }
}
