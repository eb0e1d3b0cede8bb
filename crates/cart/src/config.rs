//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CART_STORAGE_KEY` - Key the cart snapshot is stored under (default: `@GoMarketplace:products`)
//! - `CART_STORAGE_DIR` - Directory used by the file-backed store (default: `.marketplace`)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;

use thiserror::Error;

/// Default storage key for the cart snapshot.
pub const DEFAULT_STORAGE_KEY: &str = "@GoMarketplace:products";

/// Default directory for the file-backed store.
pub const DEFAULT_STORAGE_DIR: &str = ".marketplace";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartConfig {
    /// Key the full cart snapshot is written under
    pub storage_key: String,
    /// Base directory for `FileStore`
    pub storage_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            sentry_dsn: None,
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let storage_key = get_env_or_default("CART_STORAGE_KEY", DEFAULT_STORAGE_KEY);
        validate_storage_key(&storage_key)?;

        let storage_dir = PathBuf::from(get_env_or_default("CART_STORAGE_DIR", DEFAULT_STORAGE_DIR));
        let sentry_dsn = get_optional_env("SENTRY_DSN").filter(|dsn| !dsn.is_empty());

        Ok(Self {
            storage_key,
            storage_dir,
            sentry_dsn,
        })
    }

    /// Override the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Override the storage directory.
    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// The storage key must be non-blank.
fn validate_storage_key(key: &str) -> Result<(), ConfigError> {
    if key.trim().is_empty() {
        return Err(ConfigError::InvalidEnvVar(
            "CART_STORAGE_KEY".to_string(),
            "must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CartConfig::default();
        assert_eq!(config.storage_key, "@GoMarketplace:products");
        assert_eq!(config.storage_dir, PathBuf::from(".marketplace"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = CartConfig::default()
            .with_storage_key("@Test:cart")
            .with_storage_dir("/tmp/cart");
        assert_eq!(config.storage_key, "@Test:cart");
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/cart"));
    }

    #[test]
    fn test_validate_storage_key_blank() {
        let result = validate_storage_key("   ");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_validate_storage_key_valid() {
        assert!(validate_storage_key(DEFAULT_STORAGE_KEY).is_ok());
    }
}
