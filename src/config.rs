//! Connectable subscriber configuration

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};

/// Settings for a `ConnectableSubscriber`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectableConfig {
    /// Label attached to log records of this subscriber
    #[serde(default = "default_name")]
    pub name: String,

    /// Initial reservation of the priming buffer (number of events)
    #[serde(default)]
    pub buffer_capacity: usize,

    /// Report errors dropped because the downstream already returned `Stop`
    /// to the scheduler's failure hook instead of discarding them
    #[serde(default)]
    pub report_dropped_errors: bool,
}

fn default_name() -> String {
    "connectable".to_string()
}

impl Default for ConnectableConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            buffer_capacity: 0,
            report_dropped_errors: false,
        }
    }
}

impl ConnectableConfig {
    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the log label
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the initial buffer reservation
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Check the config for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StreamError::Config("name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ConnectableConfig::default();
        assert_eq!(config.name, "connectable");
        assert_eq!(config.buffer_capacity, 0);
        assert!(!config.report_dropped_errors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config = ConnectableConfig::from_json(
            r#"{"name": "replay", "bufferCapacity": 64, "reportDroppedErrors": true}"#,
        )
        .unwrap();
        assert_eq!(config.name, "replay");
        assert_eq!(config.buffer_capacity, 64);
        assert!(config.report_dropped_errors);
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config = ConnectableConfig::from_json("{}").unwrap();
        assert_eq!(config.name, "connectable");
        assert_eq!(config.buffer_capacity, 0);
    }

    #[test]
    fn test_config_rejects_empty_name() {
        let err = ConnectableConfig::from_json(r#"{"name": "  "}"#).unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
    }

    #[test]
    fn test_config_invalid_json() {
        let err = ConnectableConfig::from_json("{bad").unwrap_err();
        assert!(matches!(err, StreamError::Serialization(_)));
    }

    #[test]
    fn test_config_serialization_camel_case() {
        let config = ConnectableConfig::default().with_name("x").with_buffer_capacity(8);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["bufferCapacity"], 8);
        assert_eq!(json["reportDroppedErrors"], false);
        assert_eq!(json["name"], "x");
    }
}
