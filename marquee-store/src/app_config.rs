use marquee_core::retry::RetryPolicy;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationConfig {
    #[serde(default = "default_hold_ttl")]
    pub hold_ttl_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_max_seats")]
    pub max_seats_per_hold: usize,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            hold_ttl_seconds: default_hold_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
            max_seats_per_hold: default_max_seats(),
        }
    }
}

fn default_hold_ttl() -> u64 { 600 }
fn default_sweep_interval() -> u64 { 30 }
fn default_max_seats() -> usize { 10 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `MARQUEE__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("MARQUEE").prefix_separator("__").separator("__"))
            .build()?;

        Self::from_source(s)
    }

    pub fn from_source(source: config::Config) -> Result<Self, config::ConfigError> {
        let cfg: Self = source.try_deserialize()?;
        cfg.reservation.validate()?;
        Ok(cfg)
    }
}

impl ReservationConfig {
    /// Zero values would stop expiry or make every hold fail.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let zero = [
            ("hold_ttl_seconds", self.hold_ttl_seconds == 0),
            ("sweep_interval_seconds", self.sweep_interval_seconds == 0),
            ("max_seats_per_hold", self.max_seats_per_hold == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((key, _)) => Err(config::ConfigError::Message(format!(
                "reservation.{} must be greater than zero",
                key
            ))),
            None => Ok(()),
        }
    }
}
