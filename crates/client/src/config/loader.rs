//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Environment variables, when the required ones are all set
//! 2. Otherwise a config file, TOML or JSON by extension
//!
//! ## Environment Variables
//! Required:
//! - `PIM_BASE_URL`: root URL of the PIM instance
//! - `PIM_CLIENT_ID`, `PIM_CLIENT_SECRET`: API connection credentials
//!
//! Optional:
//! - `PIM_USERNAME`, `PIM_PASSWORD`: user for the password grant
//! - `PIM_TOKEN_URL`: token endpoint override
//! - `PIM_TIMEOUT`: per-attempt timeout in seconds
//! - `PIM_MAX_RETRIES`
//! - `PIM_TOKEN_BUFFER_SECONDS`
//! - `PIM_RATE_LIMIT_CALLS`, `PIM_RATE_LIMIT_PERIOD_SECONDS`
//! - `PIM_DEADLINE_SECONDS`: default deadline of a logical call
//! - `PIM_RETRY_WRITES`: retry non-idempotent writes (true/false)
//!
//! ## File Locations
//! Without an explicit path the loader tries, in order:
//! 1. `./pim.toml`
//! 2. `./pim.json`
//! 3. `./config/pim.toml`

use std::path::{Path, PathBuf};
use std::str::FromStr;

use pimsdk_domain::{ClientConfig, PimError, Result};
use tracing::{debug, info};

/// Load configuration, environment first, then file
///
/// # Errors
/// Returns `PimError::Config` if neither source yields a valid configuration.
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            debug!(error = %e, "environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `PIM_*` environment variables
///
/// # Errors
/// Returns `PimError::Config` if a required variable is missing, a numeric
/// variable does not parse, or the result fails validation.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config =
        ClientConfig::new(env_var("PIM_BASE_URL")?, env_var("PIM_CLIENT_ID")?, env_var("PIM_CLIENT_SECRET")?);

    config.username = env_opt("PIM_USERNAME");
    config.password = env_opt("PIM_PASSWORD");
    config.token_url = env_opt("PIM_TOKEN_URL");
    if let Some(timeout) = env_parse("PIM_TIMEOUT")? {
        config.timeout = timeout;
    }
    if let Some(max_retries) = env_parse("PIM_MAX_RETRIES")? {
        config.max_retries = max_retries;
    }
    if let Some(buffer) = env_parse("PIM_TOKEN_BUFFER_SECONDS")? {
        config.token_buffer_seconds = buffer;
    }
    if let Some(calls) = env_parse("PIM_RATE_LIMIT_CALLS")? {
        config.rate_limit_calls = calls;
    }
    if let Some(period) = env_parse("PIM_RATE_LIMIT_PERIOD_SECONDS")? {
        config.rate_limit_period_seconds = period;
    }
    config.deadline_seconds = env_parse("PIM_DEADLINE_SECONDS")?;
    config.retry_writes = env_bool("PIM_RETRY_WRITES", false);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// # Arguments
/// * `path` - config file; `None` tries [`candidate_config_paths`]
///
/// # Errors
/// Returns `PimError::Config` if the file is missing, unreadable, in an
/// unsupported format, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(PimError::Config(format!("config file not found: {}", p.display())));
            }
            p
        }
        None => candidate_config_paths().ok_or_else(|| {
            PimError::Config("no config file found in any of the standard locations".to_string())
        })?,
    };

    info!(path = %config_path.display(), "loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| PimError::Config(format!("failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| PimError::Config(format!("invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| PimError::Config(format!("invalid JSON format: {e}"))),
        _ => Err(PimError::Config(format!("unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations.
pub fn candidate_config_paths() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    [cwd.join("pim.toml"), cwd.join("pim.json"), cwd.join("config").join("pim.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| PimError::Config(format!("missing required environment variable: {key}")))
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| PimError::Config(format!("invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
