//! Schema build configuration management

use std::env;

use anyhow::{Context, Result, bail};

/// Build defaults loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Load relationships in batches unless a type says otherwise
    pub batching: bool,

    /// Generate filter input types for reflected types
    pub create_filters: bool,

    /// Name of the identifying field of reflected types
    pub id_field: String,

    /// Expose `totalCount` on generated connections
    pub connection_total_count: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batching: false,
            create_filters: true,
            id_field: "id".to_string(),
            connection_total_count: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            batching: env_bool("SQLGRAPH_BATCHING", defaults.batching)?,

            create_filters: env_bool("SQLGRAPH_CREATE_FILTERS", defaults.create_filters)?,

            id_field: env::var("SQLGRAPH_ID_FIELD").unwrap_or(defaults.id_field),

            connection_total_count: env_bool(
                "SQLGRAPH_CONNECTION_TOTAL_COUNT",
                defaults.connection_total_count,
            )?,
        })
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(value) => parse_bool(&value).with_context(|| format!("Invalid {}", key)),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got \"{}\"", other),
    }
}
