//! Configuration
//!
//! Layered settings: built-in defaults, then an optional TOML file, then
//! `WA_CAPTURE__SECTION__KEY` environment variables, then command line flags.

use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::webhook::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "wa-capture.toml";

const ENV_PREFIX: &str = "WA_CAPTURE";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint receiving captured contacts. No default: must be configured.
    #[serde(default)]
    pub url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the session's persisted credentials.
    pub auth_dir: PathBuf,
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub debug: bool,
    pub json: bool,
    pub history_capacity: usize,
    /// Daily-rolling log files are written here when set.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            debug: false,
            json: false,
            history_capacity: crate::logging::DEFAULT_HISTORY_CAPACITY,
            directory: None,
        }
    }
}

impl Config {
    /// Load defaults, the config file and the environment.
    ///
    /// An explicit `path` must exist; the implicit `wa-capture.toml` is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p.to_path_buf()).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config = Self::builder()?
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<Config>()?;

        Ok(config)
    }

    /// Parse a TOML document on top of the defaults (no environment).
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config = Self::builder()?
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Config>()?;
        Ok(config)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000_i64)?
            .set_default("webhook.url", "")?
            .set_default("webhook.timeout_secs", 10_i64)?
            .set_default("webhook.user_agent", "WhatsApp-Captador/1.0")?
            .set_default("webhook.retry.max_retries", 3_i64)?
            .set_default("webhook.retry.initial_delay_ms", 5_000_i64)?
            .set_default("webhook.retry.max_delay_ms", 60_000_i64)?
            .set_default("session.auth_dir", "auth_info")?
            .set_default("session.reconnect_delay_ms", 5_000_i64)?
            .set_default("logging.debug", false)?
            .set_default("logging.json", false)?
            .set_default(
                "logging.history_capacity",
                crate::logging::DEFAULT_HISTORY_CAPACITY as i64,
            )?;
        Ok(builder)
    }

    /// Flags and their env fallbacks (`PORT`, `WEBHOOK_URL`) win over file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(ref url) = cli.webhook_url {
            self.webhook.url = url.clone();
        }
        if let Some(ref dir) = cli.auth_dir {
            self.session.auth_dir = dir.clone();
        }
        if cli.debug {
            self.logging.debug = true;
        }
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = self.webhook.url.trim();
        if url.is_empty() {
            return Err(Error::InvalidConfig(
                "webhook.url is not set (use --webhook-url or WEBHOOK_URL)".to_string(),
            ));
        }
        match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(Error::InvalidConfig(format!(
                    "webhook.url must be http(s), got scheme '{}'",
                    parsed.scheme()
                )));
            }
            Err(e) => {
                return Err(Error::InvalidConfig(format!(
                    "webhook.url '{url}' is not a valid URL: {e}"
                )));
            }
        }

        if self.server.port == 0 {
            return Err(Error::InvalidConfig("server.port must be non-zero".to_string()));
        }
        if self.webhook.timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "webhook.timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.webhook.retry.initial_delay_ms == 0 || self.webhook.retry.max_delay_ms == 0 {
            return Err(Error::InvalidConfig(
                "webhook.retry delays must be non-zero".to_string(),
            ));
        }
        if self.session.reconnect_delay_ms == 0 {
            return Err(Error::InvalidConfig(
                "session.reconnect_delay_ms must be non-zero".to_string(),
            ));
        }
        if self.logging.history_capacity == 0 {
            return Err(Error::InvalidConfig(
                "logging.history_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.webhook.timeout(), Duration::from_secs(10));
        assert_eq!(config.webhook.user_agent, "WhatsApp-Captador/1.0");
        assert_eq!(config.session.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.session.auth_dir, PathBuf::from("auth_info"));
        assert_eq!(config.logging.history_capacity, 500);
        assert!(config.logging.directory.is_none());

        let policy = config.webhook.retry_policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_webhook_url_is_rejected() {
        let config = Config::from_toml("").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("webhook.url"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [webhook]
            url = "https://example.com/hook"

            [webhook.retry]
            max_retries = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.webhook.url, "https://example.com/hook");
        assert_eq!(config.webhook.retry.max_retries, 1);
        assert_eq!(config.webhook.retry.initial_delay_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let config =
            Config::from_toml("[webhook]\nurl = \"ftp://example.com/hook\"").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http(s)"));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[webhook]\nurl = \"http://localhost:9000/in\"").unwrap();
        writeln!(file, "[session]\nauth_dir = \"/tmp/wa-auth\"").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.webhook.url, "http://localhost:9000/in");
        assert_eq!(config.session.auth_dir, PathBuf::from("/tmp/wa-auth"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/wa-capture.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::from_toml("[webhook]\nurl = \"http://a/\"").unwrap();
        let cli = Cli::try_parse_from([
            "wa-capture",
            "--port",
            "4000",
            "--webhook-url",
            "http://b/hook",
            "--auth-dir",
            "creds",
            "--debug",
        ])
        .unwrap();
        config.apply_cli(&cli);
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.webhook.url, "http://b/hook");
        assert_eq!(config.session.auth_dir, PathBuf::from("creds"));
        assert!(config.logging.debug);
        assert_eq!(config.bind_address(), "0.0.0.0:4000");
    }
}
