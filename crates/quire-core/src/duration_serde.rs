//! Serde helpers for human-readable durations (`"250ms"`, `"10s"`, `"5m"`)
//!
//! Use with `#[serde(with = "quire_core::duration_serde")]`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(with = "crate::duration_serde")]
        timeout: Duration,
    }

    #[test]
    fn test_parse_human_durations() {
        let w: Wrapper = serde_json::from_str(r#"{"timeout":"250ms"}"#).unwrap();
        assert_eq!(w.timeout, Duration::from_millis(250));

        let w: Wrapper = serde_json::from_str(r#"{"timeout":"1m 30s"}"#).unwrap();
        assert_eq!(w.timeout, Duration::from_secs(90));

        assert!(serde_json::from_str::<Wrapper>(r#"{"timeout":"soon"}"#).is_err());
    }

    #[test]
    fn test_roundtrip() {
        let w = Wrapper {
            timeout: Duration::from_secs(10),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"timeout":"10s"}"#);
        assert_eq!(serde_json::from_str::<Wrapper>(&json).unwrap(), w);
    }
}
