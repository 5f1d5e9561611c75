use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Store backend: "memory" or "postgres"
    #[serde(default = "default_database_backend")]
    pub backend: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// What an email channel puts in the message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmailBodySource {
    /// The inbound JSON payload, serialized as-is
    #[default]
    RawContent,
    /// The route's rendered message template
    RenderedTemplate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Upper bound for a single delivery attempt, in seconds
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_seconds: u64,
    /// Number of workers processing async-mode messages
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Pending async-mode messages accepted before webhook calls are refused
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,
    #[serde(default)]
    pub email_body: EmailBodySource,
    #[serde(default = "default_email_subject")]
    pub email_subject: String,
}

impl DeliveryConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_seconds)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_database_backend() -> String {
    "memory".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300 // 5 minutes
}

fn default_attempt_timeout() -> u64 {
    10
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_email_subject() -> String {
    "Webhook notification".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.backend", "memory")?
            .set_default("delivery.attempt_timeout_seconds", 10)?
            .set_default("delivery.workers", 8)?
            .set_default("delivery.queue_capacity", 1024)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER__PORT, DATABASE__URL, JWT__SECRET, DELIVERY__ATTEMPT_TIMEOUT_SECONDS, ...
            .add_source(
                Environment::default()
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_database_backend(),
            url: String::new(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_seconds: default_attempt_timeout(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            telegram_api_base: default_telegram_api_base(),
            email_body: EmailBodySource::default(),
            email_subject: default_email_subject(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8080);

        let database = DatabaseConfig::default();
        assert_eq!(database.backend, "memory");
        assert_eq!(database.pool_size, 10);
    }

    #[test]
    fn test_delivery_defaults() {
        let delivery = DeliveryConfig::default();
        assert_eq!(delivery.attempt_timeout(), Duration::from_secs(10));
        assert_eq!(delivery.workers, 8);
        assert_eq!(delivery.email_body, EmailBodySource::RawContent);
        assert_eq!(delivery.telegram_api_base, "https://api.telegram.org");
    }

    #[test]
    fn test_email_body_source_deserialize() {
        let source: EmailBodySource = serde_json::from_str("\"rendered_template\"").unwrap();
        assert_eq!(source, EmailBodySource::RenderedTemplate);
    }
}
