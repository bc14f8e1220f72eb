//! Engine configuration with environment-variable overrides.

use crate::error::{DataError, Result};
use crate::repository::IsolationLevel;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Page size used when an offset-paginated request omits `limit`.
    pub default_page_limit: u32,
    /// Hard ceiling applied to any requested `limit`.
    pub max_page_limit: u32,
    /// Isolation level used when a caller opens an engine transaction
    /// without picking one explicitly.
    pub default_isolation: IsolationLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_limit: 20,
            max_page_limit: 500,
            default_isolation: IsolationLevel::ReadCommitted,
        }
    }
}

impl EngineConfig {
    /// Build a configuration from `CONDUCTOR_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(limit) = std::env::var("CONDUCTOR_DEFAULT_PAGE_LIMIT") {
            config.default_page_limit = limit.parse().map_err(|e| {
                DataError::Configuration(format!("Invalid default_page_limit: {e}"))
            })?;
        }

        if let Ok(max) = std::env::var("CONDUCTOR_MAX_PAGE_LIMIT") {
            config.max_page_limit = max
                .parse()
                .map_err(|e| DataError::Configuration(format!("Invalid max_page_limit: {e}")))?;
        }

        if let Ok(level) = std::env::var("CONDUCTOR_DEFAULT_ISOLATION") {
            config.default_isolation = level
                .parse()
                .map_err(|e| DataError::Configuration(format!("Invalid default_isolation: {e}")))?;
        }

        if config.default_page_limit == 0 || config.max_page_limit == 0 {
            return Err(DataError::Configuration(
                "page limits must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Clamp a requested limit into `1..=max_page_limit`.
    pub fn clamp_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_limit)
            .clamp(1, self.max_page_limit)
    }
}
