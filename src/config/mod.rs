//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vellum";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RETENTION_PERIOD_SECS: u64 = 600;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_STORAGE_DIR: &str = "storage";
const DEFAULT_CACHE_DIR: &str = "cache";
const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 600;
const DEFAULT_HEALTHCHECK_FILE: &str = "fixtures/healthcheck.docx";

/// Command-line arguments for the Vellum binary.
#[derive(Debug, Parser)]
#[command(name = "vellum", version, about = "Vellum conversion server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VELLUM_CONFIG_FILE", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Vellum HTTP service.
    Serve(Box<ServeArgs>),
    /// Apply database migrations and provision the queue schema, then exit.
    #[command(name = "migrate")]
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the connection-pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the blob storage root directory.
    #[arg(long = "storage-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub storage_directory: Option<PathBuf>,

    /// Override the conversion-artifact cache directory.
    #[arg(long = "storage-cache-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub storage_cache_directory: Option<PathBuf>,

    /// Override the signed-URL lifetime.
    #[arg(long = "storage-url-ttl-seconds", value_name = "SECONDS")]
    pub storage_url_ttl_seconds: Option<u64>,

    /// Override the queue visibility timeout.
    #[arg(long = "queue-visibility-timeout-seconds", value_name = "SECONDS")]
    pub queue_visibility_timeout_seconds: Option<u64>,

    /// Override the queue retention period.
    #[arg(long = "queue-retention-period-seconds", value_name = "SECONDS")]
    pub queue_retention_period_seconds: Option<u64>,

    /// Override the synchronous poll interval.
    #[arg(long = "convert-poll-interval-ms", value_name = "MILLIS")]
    pub convert_poll_interval_ms: Option<u64>,

    /// Override the health-check fixture file.
    #[arg(long = "convert-healthcheck-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub convert_healthcheck_file: Option<PathBuf>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub queue: QueueSettings,
    pub storage: StorageSettings,
    pub convert: ConvertTuning,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub visibility_timeout: Duration,
    pub retention_period: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub directory: PathBuf,
    pub cache_directory: PathBuf,
    pub signing_secret: String,
    pub url_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct ConvertTuning {
    pub poll_interval: Duration,
    pub healthcheck_file: PathBuf,
}

impl Settings {
    /// Upper bound for synchronous waits and record staleness: one and a
    /// half times the queue's total lifetime for a message.
    pub fn convert_timeout(&self) -> Duration {
        (self.queue.visibility_timeout + self.queue.retention_period) * 3 / 2
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("VELLUM").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Parse the process arguments and resolve settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    queue: RawQueueSettings,
    storage: RawStorageSettings,
    convert: RawConvertSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawQueueSettings {
    visibility_timeout_seconds: Option<u64>,
    retention_period_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    directory: Option<PathBuf>,
    cache_directory: Option<PathBuf>,
    signing_secret: Option<String>,
    url_ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConvertSettings {
    poll_interval_ms: Option<u64>,
    healthcheck_file: Option<PathBuf>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(directory) = overrides.storage_directory.as_ref() {
            self.storage.directory = Some(directory.clone());
        }
        if let Some(directory) = overrides.storage_cache_directory.as_ref() {
            self.storage.cache_directory = Some(directory.clone());
        }
        if let Some(ttl) = overrides.storage_url_ttl_seconds {
            self.storage.url_ttl_seconds = Some(ttl);
        }
        if let Some(seconds) = overrides.queue_visibility_timeout_seconds {
            self.queue.visibility_timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.queue_retention_period_seconds {
            self.queue.retention_period_seconds = Some(seconds);
        }
        if let Some(millis) = overrides.convert_poll_interval_ms {
            self.convert.poll_interval_ms = Some(millis);
        }
        if let Some(path) = overrides.convert_healthcheck_file.as_ref() {
            self.convert.healthcheck_file = Some(path.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            queue,
            storage,
            convert,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let queue = build_queue_settings(queue)?;
        let storage = build_storage_settings(storage)?;
        let convert = build_convert_settings(convert)?;

        Ok(Self {
            server,
            logging,
            database,
            queue,
            storage,
            convert,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .map_err(|err| LoadError::invalid("server.addr", err.to_string()))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = NonZeroU32::new(max)
        .ok_or_else(|| LoadError::invalid("database.max_connections", "must be greater than zero"))?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_queue_settings(queue: RawQueueSettings) -> Result<QueueSettings, LoadError> {
    let visibility = queue
        .visibility_timeout_seconds
        .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECS);
    let retention = queue
        .retention_period_seconds
        .unwrap_or(DEFAULT_RETENTION_PERIOD_SECS);
    if visibility == 0 {
        return Err(LoadError::invalid(
            "queue.visibility_timeout_seconds",
            "must be greater than zero",
        ));
    }
    if retention == 0 {
        return Err(LoadError::invalid(
            "queue.retention_period_seconds",
            "must be greater than zero",
        ));
    }

    Ok(QueueSettings {
        visibility_timeout: Duration::from_secs(visibility),
        retention_period: Duration::from_secs(retention),
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let directory = storage
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    let cache_directory = storage
        .cache_directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

    // Without a configured secret, signed URLs stay valid only for the
    // lifetime of this process.
    let signing_secret = match storage.signing_secret {
        Some(secret) if !secret.trim().is_empty() => secret,
        _ => uuid::Uuid::new_v4().to_string(),
    };

    let ttl = storage.url_ttl_seconds.unwrap_or(DEFAULT_SIGNED_URL_TTL_SECS);
    if ttl == 0 {
        return Err(LoadError::invalid(
            "storage.url_ttl_seconds",
            "must be greater than zero",
        ));
    }

    Ok(StorageSettings {
        directory,
        cache_directory,
        signing_secret,
        url_ttl: Duration::from_secs(ttl),
    })
}

fn build_convert_settings(convert: RawConvertSettings) -> Result<ConvertTuning, LoadError> {
    let poll_interval_ms = convert.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if poll_interval_ms == 0 {
        return Err(LoadError::invalid(
            "convert.poll_interval_ms",
            "must be greater than zero",
        ));
    }

    let healthcheck_file = convert
        .healthcheck_file
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HEALTHCHECK_FILE));

    Ok(ConvertTuning {
        poll_interval: Duration::from_millis(poll_interval_ms),
        healthcheck_file,
    })
}
