use crate::app_config::{AppConfig, Environment, SentimentBackend};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let value = or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let parse_f64 = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid(var, "must be a positive finite number".to_string()));
        }
        Ok(value)
    };

    let parse_flag = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| invalid(var, format!("not a boolean: {raw}"))),
            Err(_) => Ok(default),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("PULSE_ENV", "development"))?;
    let log_level = or_default("PULSE_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("PULSE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("PULSE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("PULSE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let queue_name = or_default("PULSE_QUEUE_NAME", "analysis_jobs");
    let worker_concurrency = parse_positive_usize("PULSE_WORKER_CONCURRENCY", "4")?;
    let worker_poll_interval_ms = parse_u64("PULSE_WORKER_POLL_INTERVAL_MS", "500")?;

    let sentiment_enabled = parse_flag("PULSE_SENTIMENT_ENABLED", false)?;
    let sentiment_fail_open = parse_flag("PULSE_SENTIMENT_FAIL_OPEN", true)?;
    let sentiment_batch_size = parse_positive_usize("PULSE_SENTIMENT_BATCH_SIZE", "32")?;
    let sentiment_backend = parse_backend(&or_default("PULSE_SENTIMENT_BACKEND", "lexicon"))?;
    let classifier_url = lookup("PULSE_CLASSIFIER_URL")
        .ok()
        .map(|u| u.trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty());
    if sentiment_backend == SentimentBackend::Http && classifier_url.is_none() {
        return Err(ConfigError::MissingEnvVar("PULSE_CLASSIFIER_URL".to_string()));
    }
    let classifier_timeout_secs = parse_u64("PULSE_CLASSIFIER_TIMEOUT_SECS", "30")?;
    let sentiment_label_map = lookup("PULSE_SENTIMENT_LABEL_MAP").ok();

    let trend_window = parse_positive_usize("PULSE_TREND_WINDOW", "5")?;
    let trend_z_threshold = parse_f64("PULSE_TREND_Z_THRESHOLD", "2.0")?;
    let trend_min_points = parse_positive_usize("PULSE_TREND_MIN_POINTS", "8")?;

    let default_model_name = or_default("PULSE_DEFAULT_MODEL_NAME", "rubert-tiny2");
    let default_model_version = or_default("PULSE_DEFAULT_MODEL_VERSION", "v1");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        queue_name,
        worker_concurrency,
        worker_poll_interval_ms,
        sentiment_enabled,
        sentiment_fail_open,
        sentiment_batch_size,
        sentiment_backend,
        classifier_url,
        classifier_timeout_secs,
        sentiment_label_map,
        trend_window,
        trend_z_threshold,
        trend_min_points,
        default_model_name,
        default_model_version,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PULSE_ENV".to_string(),
            reason: format!("unknown environment: {other}"),
        }),
    }
}

fn parse_backend(s: &str) -> Result<SentimentBackend, ConfigError> {
    match s {
        "http" => Ok(SentimentBackend::Http),
        "lexicon" => Ok(SentimentBackend::Lexicon),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PULSE_SENTIMENT_BACKEND".to_string(),
            reason: format!("expected `http` or `lexicon`, got `{other}`"),
        }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
