//! Store and tool configuration.
//!
//! Configuration is loaded from environment variables. Every variable is
//! optional and falls back to the documented default.
//!
//! # Environment Variables
//!
//! - `TABLESTORE_MAX_RECORD_SIZE`: Largest record payload in bytes (default: `1024`)
//! - `TABLESTORE_ALLOW_OVERWRITE`: Let `inject` replace an existing record (default: `false`)
//! - `TABLESTORE_REQUIRE_PRIMARY`: Reject index stores for absent records (default: `true`)
//! - `TABLESTORE_STRICT_EJECT`: Report ejecting an absent record as an error (default: `true`)
//! - `TABLESTORE_SNAPSHOT_PATH`: Snapshot file to verify instead of simulating
//! - `TABLESTORE_SIM_SEED`: Simulation seed (default: `0`)
//! - `TABLESTORE_SIM_OPERATIONS`: Simulation length (default: `10000`)
//!
//! # Invariants
//!
//! - `max_record_size` never exceeds `MAX_RECORD_SIZE`, the largest record the
//!   ordered medium can hold

use std::path::PathBuf;

use crate::storage::MAX_RECORD_SIZE;

/// Behaviour of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Largest record payload accepted by `inject`.
    pub max_record_size: usize,
    /// When set, `inject` on an existing identity replaces the record.
    pub allow_overwrite: bool,
    /// When set, index stores fail unless the primary record exists.
    pub require_primary: bool,
    /// When set, ejecting an absent record fails with `NotFound`.
    pub strict_eject: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_record_size: MAX_RECORD_SIZE,
            allow_overwrite: false,
            require_primary: true,
            strict_eject: true,
        }
    }
}

impl StoreConfig {
    /// Set the maximum record size, clamped to `MAX_RECORD_SIZE`.
    #[must_use]
    pub fn with_max_record_size(mut self, size: usize) -> Self {
        self.max_record_size = size.min(MAX_RECORD_SIZE);
        self
    }

    #[must_use]
    pub const fn with_allow_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    #[must_use]
    pub const fn with_require_primary(mut self, require: bool) -> Self {
        self.require_primary = require;
        self
    }

    #[must_use]
    pub const fn with_strict_eject(mut self, strict: bool) -> Self {
        self.strict_eject = strict;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if
    /// `TABLESTORE_MAX_RECORD_SIZE` exceeds `MAX_RECORD_SIZE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_record_size = match lookup("TABLESTORE_MAX_RECORD_SIZE") {
            Some(value) => {
                let size = parse_number::<usize>("TABLESTORE_MAX_RECORD_SIZE", &value)?;
                if size > MAX_RECORD_SIZE {
                    return Err(ConfigError::InvalidValue {
                        name: "TABLESTORE_MAX_RECORD_SIZE".to_string(),
                        message: format!("{size} exceeds the limit of {MAX_RECORD_SIZE} bytes"),
                    });
                }
                size
            }
            None => defaults.max_record_size,
        };

        Ok(Self {
            max_record_size,
            allow_overwrite: load_bool(&lookup, "TABLESTORE_ALLOW_OVERWRITE", defaults.allow_overwrite)?,
            require_primary: load_bool(&lookup, "TABLESTORE_REQUIRE_PRIMARY", defaults.require_primary)?,
            strict_eject: load_bool(&lookup, "TABLESTORE_STRICT_EJECT", defaults.strict_eject)?,
        })
    }
}

/// Configuration of the `tablestore` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub store: StoreConfig,
    /// Snapshot to import and verify. When unset the binary runs a simulation.
    pub snapshot_path: Option<PathBuf>,
    pub sim_seed: u64,
    pub sim_operations: usize,
}

impl ToolConfig {
    /// Default simulation length.
    pub const DEFAULT_SIM_OPERATIONS: usize = 10_000;

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = StoreConfig::from_lookup(&lookup)?;
        let snapshot_path = lookup("TABLESTORE_SNAPSHOT_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let sim_seed = lookup("TABLESTORE_SIM_SEED")
            .map(|v| parse_number::<u64>("TABLESTORE_SIM_SEED", &v))
            .transpose()?
            .unwrap_or(0);
        let sim_operations = lookup("TABLESTORE_SIM_OPERATIONS")
            .map(|v| parse_number::<usize>("TABLESTORE_SIM_OPERATIONS", &v))
            .transpose()?
            .unwrap_or(Self::DEFAULT_SIM_OPERATIONS);

        Ok(Self {
            store,
            snapshot_path,
            sim_seed,
            sim_operations,
        })
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        message: format!("'{value}' is not a valid number"),
    })
}

fn load_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a boolean"),
        }),
    }
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
