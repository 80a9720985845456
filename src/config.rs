use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::ml::forecasting::sequence::SequenceSettings;
use crate::ml::forecasting::EngineSettings;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_FORECAST_DAYS: usize = 30;
const MAX_FORECAST_DAYS: usize = 365;
const DEFAULT_SEQUENCE_EPOCHS: usize = 50;
const DEFAULT_SEQUENCE_HIDDEN_UNITS: usize = 16;
const DEFAULT_SEQUENCE_LEARNING_RATE: f64 = 0.01;
const DEFAULT_SEQUENCE_DEADLINE_MS: u64 = 2_000;
const DEFAULT_SEQUENCE_SEED: u64 = 42;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Forecast service configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ForecastConfig {
    /// Server host address
    #[validate(length(min = 1, message = "host cannot be empty"))]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1, message = "environment cannot be empty"))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Horizon used when a forecast request does not name one
    #[serde(default = "default_forecast_days")]
    #[validate(range(min = 1, max = 365))]
    pub default_forecast_days: usize,

    /// Largest horizon a caller may request
    #[serde(default = "default_max_forecast_days")]
    #[validate(range(min = 1, max = 365))]
    pub max_forecast_days: usize,

    /// Training epochs for the sequence model
    #[serde(default = "default_sequence_epochs")]
    #[validate(range(min = 1, max = 500))]
    pub sequence_epochs: usize,

    /// Hidden state width of the sequence model
    #[serde(default = "default_sequence_hidden_units")]
    #[validate(range(min = 1, max = 128))]
    pub sequence_hidden_units: usize,

    #[serde(default = "default_sequence_learning_rate")]
    #[validate(range(min = 0.000001, max = 1.0))]
    pub sequence_learning_rate: f64,

    /// Wall-clock training budget for the sequence model, in milliseconds
    #[serde(default = "default_sequence_deadline_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub sequence_deadline_ms: u64,

    #[serde(default = "default_sequence_seed")]
    pub sequence_seed: u64,

    /// Seed for forecast noise; unset draws fresh entropy per call
    #[serde(default)]
    pub noise_seed: Option<u64>,

    /// JSON file of products loaded into the in-memory catalog at startup
    #[serde(default)]
    pub products_path: Option<String>,

    /// Per-request timeout for HTTP handlers
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            environment: DEFAULT_ENV.to_string(),
            log_level: default_log_level(),
            log_json: false,
            default_forecast_days: DEFAULT_FORECAST_DAYS,
            max_forecast_days: MAX_FORECAST_DAYS,
            sequence_epochs: DEFAULT_SEQUENCE_EPOCHS,
            sequence_hidden_units: DEFAULT_SEQUENCE_HIDDEN_UNITS,
            sequence_learning_rate: DEFAULT_SEQUENCE_LEARNING_RATE,
            sequence_deadline_ms: DEFAULT_SEQUENCE_DEADLINE_MS,
            sequence_seed: DEFAULT_SEQUENCE_SEED,
            noise_seed: None,
            products_path: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ForecastConfig {
    /// Checks if running in production
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Address the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Forecast engine tuning derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            sequence: SequenceSettings {
                epochs: self.sequence_epochs,
                hidden_units: self.sequence_hidden_units,
                learning_rate: self.sequence_learning_rate,
                deadline: Duration::from_millis(self.sequence_deadline_ms),
                seed: self.sequence_seed,
            },
            noise_seed: self.noise_seed,
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.default_forecast_days > self.max_forecast_days {
            let mut err = ValidationError::new("default_forecast_days_exceeds_max");
            err.message = Some("default_forecast_days must not exceed max_forecast_days".into());
            errors.add("default_forecast_days", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_forecast_days() -> usize {
    DEFAULT_FORECAST_DAYS
}

fn default_max_forecast_days() -> usize {
    MAX_FORECAST_DAYS
}

fn default_sequence_epochs() -> usize {
    DEFAULT_SEQUENCE_EPOCHS
}

fn default_sequence_hidden_units() -> usize {
    DEFAULT_SEQUENCE_HIDDEN_UNITS
}

fn default_sequence_learning_rate() -> f64 {
    DEFAULT_SEQUENCE_LEARNING_RATE
}

fn default_sequence_deadline_ms() -> u64 {
    DEFAULT_SEQUENCE_DEADLINE_MS
}

fn default_sequence_seed() -> u64 {
    DEFAULT_SEQUENCE_SEED
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("stateset_forecast={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    // Optional OpenTelemetry export via env (APP__OTEL_ENABLED or OTEL_EXPORTER_OTLP_ENDPOINT)
    let otel_enabled = env::var("APP__OTEL_ENABLED")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
        || env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok();

    if otel_enabled {
        use opentelemetry::KeyValue;
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::{trace as sdktrace, Resource};

        let endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| "http://localhost:4317".to_string());
        let service_name =
            env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "stateset-forecast".to_string());

        let resource = Resource::new(vec![KeyValue::new("service.name", service_name)]);
        let tracer = match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint),
            )
            .with_trace_config(sdktrace::config().with_resource(resource))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
        {
            Ok(tracer) => tracer,
            Err(err) => {
                error!("Failed to install OTLP pipeline: {}", err);
                if json {
                    let _ = fmt().with_env_filter(filter_directive).json().try_init();
                } else {
                    let _ = fmt().with_env_filter(filter_directive).try_init();
                }
                return;
            }
        };

        let base = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .with(EnvFilter::new(filter_directive));

        if json {
            let _ = base.with(fmt::layer().json()).try_init();
        } else {
            let _ = base.with(fmt::layer()).try_init();
        }
    } else if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads the forecast service configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<ForecastConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let builder = layered_builder(Path::new(CONFIG_DIR), &run_env)?
        .add_source(Environment::with_prefix("APP").separator("__"));

    finish(builder.build()?)
}

/// Loads configuration from an explicit directory, without environment overrides
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<ForecastConfig, AppConfigError> {
    finish(layered_builder(config_dir, run_env)?.build()?)
}

fn layered_builder(
    config_dir: &Path,
    run_env: &str,
) -> Result<ConfigBuilder<config::builder::DefaultState>, AppConfigError> {
    let default_file = config_dir.join("default");
    let env_file = config_dir.join(run_env);

    Ok(Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&default_file.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_file.to_string_lossy()).required(false)))
}

fn finish(config: Config) -> Result<ForecastConfig, AppConfigError> {
    let forecast_config: ForecastConfig = config.try_deserialize()?;

    forecast_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    forecast_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(forecast_config)
}
