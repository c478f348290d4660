//! Engine configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to its
//! default.
//!
//! ```json
//! { "default_gas_limit": 1000000, "max_gas_limit": 100000000, "log_level": "warn" }
//! ```

use std::path::Path;

use crate::{Error, Result, DEFAULT_GAS_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Gas limit used when the caller does not pass one
    pub default_gas_limit: u64,
    /// Largest gas limit a caller may request
    pub max_gas_limit: u64,
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_gas_limit: DEFAULT_GAS_LIMIT,
            max_gas_limit: 100_000_000,
            log_level: "warn".into(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_gas_limit == 0 {
            return Err(Error::Config("max_gas_limit must be greater than 0".into()));
        }
        if self.default_gas_limit > self.max_gas_limit {
            return Err(Error::Config(format!(
                "default_gas_limit {} exceeds max_gas_limit {}",
                self.default_gas_limit, self.max_gas_limit
            )));
        }
        Ok(())
    }

    /// Reject a requested gas limit above `max_gas_limit`
    pub fn admit_gas_limit(&self, gas_limit: u64) -> Result<u64> {
        if gas_limit > self.max_gas_limit {
            return Err(Error::InvalidInput(format!(
                "gas limit {} exceeds maximum of {}",
                gas_limit, self.max_gas_limit
            )));
        }
        Ok(gas_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(config.max_gas_limit, 100_000_000);
        assert_eq!(config.log_level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"log_level": "debug"}"#).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.default_gas_limit, DEFAULT_GAS_LIMIT);
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_inconsistent_limits_rejected() {
        let err = EngineConfig::from_json(r#"{"default_gas_limit": 10, "max_gas_limit": 5}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = EngineConfig::from_json(r#"{"default_gas_limit": 0, "max_gas_limit": 0}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"gas": 1}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/ace.json")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }

    #[test]
    fn test_admit_gas_limit() {
        let config = EngineConfig::default();
        assert_eq!(config.admit_gas_limit(500).unwrap(), 500);
        assert_eq!(config.admit_gas_limit(100_000_000).unwrap(), 100_000_000);
        assert!(matches!(
            config.admit_gas_limit(100_000_001),
            Err(Error::InvalidInput(_))
        ));
    }
}
