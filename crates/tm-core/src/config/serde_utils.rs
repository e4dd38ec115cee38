//! Shared serialization/deserialization utilities for configuration

/// Helper module for Duration serialization as whole seconds
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "tm_core::config::serde_utils::duration_secs")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TimeoutConfig {
        #[serde(with = "duration_secs")]
        readiness_timeout: Duration,
    }

    #[test]
    fn test_duration_secs_serialize() {
        let config = TimeoutConfig {
            readiness_timeout: Duration::from_secs(45),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"readiness_timeout":45}"#);
    }

    #[test]
    fn test_duration_secs_deserialize() {
        let config: TimeoutConfig = toml::from_str("readiness_timeout = 90").unwrap();
        assert_eq!(config.readiness_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_duration_secs_rejects_negative() {
        assert!(toml::from_str::<TimeoutConfig>("readiness_timeout = -1").is_err());
    }
}
