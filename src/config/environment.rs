// Start of file: /src/config/environment.rs

// * Agent configuration loaded once from the process environment and .env,
// * with a lazily-initialized singleton for the binary.

use std::{borrow::Cow, collections::HashMap, path::PathBuf};
// * anyhow for convenient error handling
use anyhow::{Context, Result};
// * once_cell for lazy static initialization
use once_cell::sync::Lazy;
use tracing::warn;

// ! Default values for environment variables (used if variables aren't set):
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8126;
const DEFAULT_MAX_BODY_SIZE: usize = 67_108_864; // 64MB, above the 50MB payload check
const DEFAULT_TIMEOUT: u64 = 60; // 60 seconds, leaves room for stalled traces
const DEFAULT_TRACE_LANGUAGE: &str = "default";
const DEFAULT_SPECIFICATION_DIR: &str = "./specifications";

// * A struct containing all environment variables used by the agent
#[derive(Clone, Debug)]
pub struct EnvironmentVariables {
    pub environment: Cow<'static, str>,
    pub host: Cow<'static, str>,
    pub port: u16,
    pub max_request_body_size: usize,
    pub default_timeout_seconds: u64,
    // * None means "every check enabled by default"
    pub enabled_checks: Option<Vec<String>>,
    pub disable_error_responses: bool,
    pub trace_request_delay: f64,
    pub trace_language: Cow<'static, str>,
    pub specification_dir: PathBuf,
    pub failure_log_path: Option<PathBuf>,
}

impl Default for EnvironmentVariables {
    fn default() -> Self {
        Self {
            environment: Cow::Borrowed(DEFAULT_ENVIRONMENT),
            host: Cow::Borrowed(DEFAULT_HOST),
            port: DEFAULT_PORT,
            max_request_body_size: DEFAULT_MAX_BODY_SIZE,
            default_timeout_seconds: DEFAULT_TIMEOUT,
            enabled_checks: None,
            disable_error_responses: false,
            trace_request_delay: 0.0,
            trace_language: Cow::Borrowed(DEFAULT_TRACE_LANGUAGE),
            specification_dir: PathBuf::from(DEFAULT_SPECIFICATION_DIR),
            failure_log_path: None,
        }
    }
}

impl EnvironmentVariables {
    // * Loads environment variables.
    // * Only reads .env if ENVIRONMENT != "production".
    pub fn load() -> Result<Self> {
        // ? In non-production environments, attempt to load .env
        if std::env::var("ENVIRONMENT").unwrap_or_default() != "production" {
            dotenv::dotenv().ok();
        }

        // * Collect all environment vars from the system and .env
        let vars: HashMap<String, String> = std::env::vars().collect();

        Self::from_vars(&vars)
    }

    // * Builds the configuration from a key/value map, providing defaults if missing
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        // * A small helper closure to fetch a non-empty variable by key
        let get_var = |key: &str| vars.get(key).map(String::as_str).filter(|s: &&str| !s.trim().is_empty());
        let defaults: Self = Self::default();

        Ok(Self {
            environment: get_var("ENVIRONMENT")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or_else(|| {
                    warn!("Missing ENVIRONMENT, defaulting to '{DEFAULT_ENVIRONMENT}'");
                    defaults.environment
                }),

            host: get_var("HOST")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or(defaults.host),

            port: get_var("PORT")
                .map(|s| s.parse().context("Invalid PORT value"))
                .transpose()?
                .unwrap_or(defaults.port),

            max_request_body_size: get_var("MAX_REQUEST_BODY_SIZE")
                .map(|s| s.parse().context("Invalid MAX_REQUEST_BODY_SIZE"))
                .transpose()?
                .unwrap_or(defaults.max_request_body_size),

            default_timeout_seconds: get_var("DEFAULT_TIMEOUT_SECONDS")
                .map(|s| s.parse().context("Invalid DEFAULT_TIMEOUT_SECONDS"))
                .transpose()?
                .unwrap_or(defaults.default_timeout_seconds),

            enabled_checks: get_var("ENABLED_CHECKS").map(parse_list),

            disable_error_responses: get_var("DISABLE_ERROR_RESPONSES")
                .map(|s| parse_bool(s).context("Invalid DISABLE_ERROR_RESPONSES"))
                .transpose()?
                .unwrap_or(defaults.disable_error_responses),

            trace_request_delay: get_var("TRACE_REQUEST_DELAY")
                .map(|s| s.parse().context("Invalid TRACE_REQUEST_DELAY"))
                .transpose()?
                .unwrap_or(defaults.trace_request_delay),

            trace_language: get_var("TRACE_LANGUAGE")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or(defaults.trace_language),

            specification_dir: get_var("SPECIFICATION_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.specification_dir),

            failure_log_path: get_var("FAILURE_LOG_PATH").map(PathBuf::from),
        })
    }

    // * Returns a reference to the lazily-initialized environment configuration
    pub fn instance() -> &'static Self {
        static INSTANCE: Lazy<Result<EnvironmentVariables, anyhow::Error>> = Lazy::new(|| {
            let config: EnvironmentVariables = EnvironmentVariables::load()?;

            if cfg!(debug_assertions) {
                tracing::debug!("Loaded environment configuration: {:#?}", config);
            }

            Ok(config)
        });

        // ! Panics if loading fails
        INSTANCE.as_ref().expect("Failed to load environment configuration")
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s: &&str| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{other}'"),
    }
}


// End of file: /src/config/environment.rs
