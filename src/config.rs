//! Configuration loader and validator for the moderation bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub site: Site,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub listen_addr: String,
    pub public_url: String,
    pub panel_html: String,
    pub poll_interval_secs: u64,
    pub poll_startup_delay_secs: u64,
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub share_webhook_dedup: bool,
    #[serde(default)]
    pub keepalive_url: Option<String>,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    pub moderators: Vec<i64>,
}

/// Site API endpoint and shared secrets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Site {
    pub base_url: String,
    pub api_secret: String,
    pub webhook_secret: String,
}

fn default_true() -> bool {
    true
}

fn default_keepalive_interval() -> u64 {
    600
}

impl App {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_startup_delay(&self) -> Duration {
        Duration::from_secs(self.poll_startup_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// URL of the moderation panel page, `{public_url}/app`.
    pub fn panel_url(&self) -> Result<Url, url::ParseError> {
        let base = self.public_url.trim_end_matches('/');
        Url::parse(&format!("{}/app", base))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.listen_addr.parse()
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.socket_addr().is_err() {
        return Err(ConfigError::Invalid("app.listen_addr must be a socket address"));
    }
    if Url::parse(&cfg.app.public_url).is_err() {
        return Err(ConfigError::Invalid("app.public_url must be an absolute URL"));
    }
    if cfg.app.panel_html.trim().is_empty() {
        return Err(ConfigError::Invalid("app.panel_html must be non-empty"));
    }
    if cfg.app.poll_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_secs must be > 0"));
    }
    if cfg.app.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.request_timeout_secs must be > 0"));
    }
    if let Some(url) = &cfg.app.keepalive_url {
        if Url::parse(url).is_err() {
            return Err(ConfigError::Invalid("app.keepalive_url must be an absolute URL"));
        }
        if cfg.app.keepalive_interval_secs == 0 {
            return Err(ConfigError::Invalid("app.keepalive_interval_secs must be > 0"));
        }
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }
    if cfg.telegram.moderators.is_empty() {
        return Err(ConfigError::Invalid("telegram.moderators must list at least one id"));
    }

    if Url::parse(&cfg.site.base_url).is_err() {
        return Err(ConfigError::Invalid("site.base_url must be an absolute URL"));
    }
    if cfg.site.api_secret.trim().is_empty() {
        return Err(ConfigError::Invalid("site.api_secret must be non-empty"));
    }
    if cfg.site.webhook_secret.trim().is_empty() {
        return Err(ConfigError::Invalid("site.webhook_secret must be non-empty"));
    }

    Ok(())
}

/// Returns a complete example YAML document.
pub fn example() -> &'static str {
    r#"app:
  listen_addr: "0.0.0.0:8000"
  public_url: "https://moderation.example.com"
  panel_html: "./app.html"
  poll_interval_secs: 60
  poll_startup_delay_secs: 5
  request_timeout_secs: 10
  share_webhook_dedup: true
  keepalive_url: null
  keepalive_interval_secs: 600

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  moderators:
    - 123456789
    - 222222

site:
  base_url: "https://music.example.com"
  api_secret: "YOUR_SITE_API_SECRET"
  webhook_secret: "YOUR_WEBHOOK_SECRET"
"#
}
