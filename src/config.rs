//! Application configuration and driver wiring.
//!
//! Sources, later overriding earlier:
//! 1. `eventlog.yaml` in the working directory (if present)
//! 2. the file passed to [`AppConfig::load`] or named by `EVENTLOG_CONFIG`
//! 3. environment variables such as `EVENTLOG__BACKEND=postgres` or
//!    `EVENTLOG__POSTGRES__URL=postgres://...`

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::event_sourcing::{
    EventLog, InMemoryDriver, NotificationDriver, Notifier, PayloadRegistry, PostgresDriver, RedisDriver,
    VerboseDriver,
};
use crate::messaging::RedisNotifier;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "eventlog.yaml";
/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "EVENTLOG_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "EVENTLOG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Postgres,
    Redis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sink {
    #[default]
    None,
    Redis,
    Kafka,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub url: String,
    pub table: String,
    pub max_connections: u32,
    /// Run `CREATE TABLE IF NOT EXISTS` on startup.
    pub create_table: bool,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/eventlog".to_string(),
            table: "events".to_string(),
            max_connections: 5,
            create_table: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1/".to_string(),
            key_prefix: "eventlog".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub sink: Sink,
    /// Redis server for the pub/sub sink.
    pub url: String,
    /// Redis pub/sub channel.
    pub channel: String,
    /// Kafka bootstrap servers.
    pub brokers: String,
    pub topic: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sink: Sink::None,
            url: RedisConfig::default().url,
            channel: "eventlog.events".to_string(),
            brokers: "127.0.0.1:9092".to_string(),
            topic: "eventlog.events".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub notify: NotifyConfig,
    /// Wrap the driver in the logging decorator.
    pub verbose: bool,
}

impl AppConfig {
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config, Environment, File, FileFormat};

        let mut builder = Config::builder().add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::new(path, FileFormat::Yaml).required(true));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?;

        config.try_deserialize().context("invalid configuration")
    }

    /// Parse a YAML document, ignoring files and environment.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        use ::config::{Config, File, FileFormat};

        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .context("failed to parse configuration")?;

        config.try_deserialize().context("invalid configuration")
    }
}

/// Build the configured backend and wrap it in the configured decorators.
///
/// Decorators are stacked as `Verbose(Notification(backend))`, so log
/// records are emitted after the notification attempt. The returned handle
/// keeps the stream reads of the backend.
pub async fn build_driver(config: &AppConfig, registry: Arc<PayloadRegistry>) -> Result<Arc<dyn EventLog>> {
    let mut driver: Arc<dyn EventLog> = match config.backend {
        Backend::Memory => Arc::new(InMemoryDriver::new(registry)),
        Backend::Postgres => {
            let pg = &config.postgres;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(pg.max_connections)
                .connect(&pg.url)
                .await
                .with_context(|| format!("failed to connect to {}", pg.url))?;

            if pg.create_table {
                sqlx::query(&PostgresDriver::schema(&pg.table))
                    .execute(&pool)
                    .await
                    .context("failed to create event table")?;
            }

            Arc::new(PostgresDriver::new(pool, &pg.table, registry))
        }
        Backend::Redis => {
            let redis = &config.redis;
            Arc::new(RedisDriver::connect(&redis.url, &redis.key_prefix, registry).await?)
        }
    };

    if let Some(notifier) = build_notifier(&config.notify).await? {
        driver = Arc::new(NotificationDriver::new(driver, notifier));
    }

    if config.verbose {
        driver = Arc::new(VerboseDriver::new(driver));
    }

    tracing::info!(
        backend = ?config.backend,
        sink = ?config.notify.sink,
        verbose = config.verbose,
        "Event log driver ready"
    );

    Ok(driver)
}

async fn build_notifier(notify: &NotifyConfig) -> Result<Option<Arc<dyn Notifier>>> {
    let notifier: Arc<dyn Notifier> = match notify.sink {
        Sink::None => return Ok(None),
        Sink::Redis => Arc::new(RedisNotifier::connect(&notify.url, &notify.channel).await?),
        #[cfg(feature = "kafka")]
        Sink::Kafka => Arc::new(crate::messaging::RedpandaNotifier::new(&notify.brokers, &notify.topic)?),
        #[cfg(not(feature = "kafka"))]
        Sink::Kafka => anyhow::bail!("the kafka sink requires the `kafka` feature"),
    };

    Ok(Some(notifier))
}
