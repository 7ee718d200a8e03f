//! Shared serde helpers for configuration types

/// Serialize a `Duration` as whole seconds (u64)
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "glisten_core::config::serde_utils::duration_secs")]
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
    struct RejectionDelay {
        #[serde(with = "duration_secs")]
        delay: Duration,
    }

    #[test]
    fn test_duration_secs_serialize() {
        let value = RejectionDelay {
            delay: Duration::from_secs(2),
        };
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"delay":2}"#);
    }

    #[test]
    fn test_duration_secs_deserialize() {
        let value: RejectionDelay = serde_json::from_str(r#"{"delay":5}"#).unwrap();
        assert_eq!(value.delay, Duration::from_secs(5));
    }
}
