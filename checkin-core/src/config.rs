use std::env;
use std::path::PathBuf;

use crate::errors::{CheckinError, ConfigError};

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8090";
const DEFAULT_LOOKUP_DEBOUNCE_MS: u64 = 250;
const DEFAULT_DNF_MAX_TERMS: usize = 1024;

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Configuration shared by the CLI and the analysis service.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub environment: Environment,
    pub log_level: Option<String>,
    pub http_bind: String,
    pub lookup_url: Option<String>,
    pub lookup_debounce_ms: u64,
    pub catalog_path: Option<PathBuf>,
    /// Largest normal form the analysis service computes.
    pub dnf_max_terms: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: None,
            http_bind: DEFAULT_HTTP_BIND.to_string(),
            lookup_url: None,
            lookup_debounce_ms: DEFAULT_LOOKUP_DEBOUNCE_MS,
            catalog_path: None,
            dnf_max_terms: DEFAULT_DNF_MAX_TERMS,
        }
    }
}

impl CoreConfig {
    /// Loads configuration from the process environment (`CHECKIN_*`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix("CHECKIN_")
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `GATE_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);

        let environment = env::var(key("ENV"))
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();
        let log_level = env::var(key("LOG")).ok();
        let http_bind = env::var(key("HTTP_BIND")).unwrap_or_else(|_| DEFAULT_HTTP_BIND.into());
        let lookup_url = env::var(key("LOOKUP_URL")).ok();
        let catalog_path = env::var(key("CATALOG")).ok().map(PathBuf::from);

        let lookup_debounce_ms =
            parse_number(&key("LOOKUP_DEBOUNCE_MS"), DEFAULT_LOOKUP_DEBOUNCE_MS)?;
        let dnf_max_terms = parse_number(&key("DNF_MAX_TERMS"), DEFAULT_DNF_MAX_TERMS)?;

        Ok(Self {
            environment,
            log_level,
            http_bind,
            lookup_url,
            lookup_debounce_ms,
            catalog_path,
            dnf_max_terms,
        })
    }

    /// Whether the process is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    /// Log level when neither a flag nor `CHECKIN_LOG` names one. Production
    /// only reports warnings.
    pub fn effective_log_level(&self) -> &str {
        match self.log_level.as_deref() {
            Some(level) => level,
            None if self.is_production() => "warn",
            None => "info",
        }
    }

    /// Returns the lookup endpoint if configured.
    pub fn lookup_url(&self) -> Option<&str> {
        self.lookup_url.as_deref()
    }
}

/// Helper that loads config and converts to the canonical error type.
pub fn load_core_config() -> Result<CoreConfig, CheckinError> {
    Ok(CoreConfig::from_env()?)
}

fn parse_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
        }),
        Err(_) => Ok(default),
    }
}
