//! Configuration for locus
//!
//! Embedders load this from TOML or construct it directly. Everything has a
//! working default; the file is optional.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::store::{DEFAULT_LIMIT, MAX_LIMIT};

/// locus configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Enable substring matching in name lookups (off: exact and
    /// case-insensitive exact only)
    pub substring_lookup: bool,

    /// Query paging limits
    pub query: QueryLimits,
}

/// Clamping window for caller-supplied page sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    /// Page size when the caller names none
    pub default_limit: usize,

    /// Hard ceiling on caller-supplied page sizes
    pub max_limit: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

impl QueryLimits {
    /// Clamp a caller-supplied limit into the configured window.
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).clamp(1, self.max_limit)
    }
}

impl Config {
    /// Load config from a TOML file; missing file means defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("read: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| crate::Error::Config(format!("write: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_clamp_into_window() {
        let limits = QueryLimits::default();
        assert_eq!(limits.clamp(None), DEFAULT_LIMIT);
        assert_eq!(limits.clamp(Some(0)), 1);
        assert_eq!(limits.clamp(Some(75)), 75);
        assert_eq!(limits.clamp(Some(5_000)), MAX_LIMIT);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config {
            substring_lookup: true,
            query: QueryLimits {
                default_limit: 25,
                max_limit: 100,
            },
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert!(back.substring_lookup);
        assert_eq!(back.query.default_limit, 25);
        assert_eq!(back.query.max_limit, 100);
    }
}
