use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Search defaults applied when the caller does not supply explicit values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefaults {
    /// Search radius in meters
    #[serde(default = "default_radius_m")]
    pub radius_m: u32,

    /// Maximum number of results returned
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_radius_m() -> u32 {
    1000
}

fn default_limit() -> usize {
    10
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            radius_m: default_radius_m(),
            limit: default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum age of a cached free-provider response, in seconds
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Google Places API key; absent means the free provider is used
    #[serde(default)]
    pub google_places_api_key: Option<String>,

    /// Search defaults
    #[serde(default)]
    pub search: SearchDefaults,
}

fn default_cache_ttl_seconds() -> u64 {
    24 * 3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl_seconds(),
            google_places_api_key: None,
            search: SearchDefaults::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.cache_ttl_seconds == 0 {
            result.add_warning(
                "cache_ttl_seconds",
                "Result caching disabled (0 seconds) - every search hits the network",
            );
        }

        if self.search.radius_m == 0 {
            result.add_error("search.radius_m", "Search radius must be greater than 0");
        } else if self.search.radius_m > 50_000 {
            result.add_warning(
                "search.radius_m",
                "Search radius above 50 km makes spatial queries very slow",
            );
        }

        if self.search.limit == 0 {
            result.add_error("search.limit", "Result limit must be greater than 0");
        }

        if let Some(key) = &self.google_places_api_key {
            if key.trim().is_empty() {
                result.add_warning(
                    "google_places_api_key",
                    "API key is blank - the free provider will be used",
                );
            }
        }

        result
    }

    /// The configured cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("brewfind");

        Ok(config_dir.join("config.toml"))
    }
}
