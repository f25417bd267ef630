//! Serde helpers for human-readable durations in configuration.
//!
//! Accepts integer seconds (`30`) or humantime strings (`"10ms"`, `"1h 30m"`)
//! and always writes humantime strings back out.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::{fmt, time::Duration};

/// Duration fields
pub mod duration {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let duration_str = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&duration_str)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str(
                    "a duration as seconds (number) or human-readable string (e.g., '10ms', '5m', '1h30m')",
                )
            }

            fn visit_u64<E>(self, seconds: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Duration::from_secs(seconds))
            }

            // Env providers hand numbers over as signed integers
            fn visit_i64<E>(self, seconds: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| de::Error::custom(format!("Negative duration: {seconds}s")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(value)
                    .map_err(|e| de::Error::custom(format!("Invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

/// Option<Duration> fields, used for per-job-type overrides
pub mod option_duration {
    use super::*;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => {
                let duration_str = humantime::format_duration(*d).to_string();
                serializer.serialize_some(&duration_str)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OptionDurationVisitor;

        impl<'de> Visitor<'de> for OptionDurationVisitor {
            type Value = Option<Duration>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter
                    .write_str("null or a duration as seconds (number) or human-readable string")
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(None)
            }

            fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>,
            {
                super::duration::deserialize(deserializer).map(Some)
            }
        }

        deserializer.deserialize_option(OptionDurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::duration")]
        every: Duration,
        #[serde(
            default,
            with = "super::option_duration",
            skip_serializing_if = "Option::is_none"
        )]
        cooldown: Option<Duration>,
    }

    #[test]
    fn test_parses_seconds_and_humantime() {
        let sample: Sample = toml::from_str("every = 30\ncooldown = \"10m\"").unwrap();
        assert_eq!(sample.every, Duration::from_secs(30));
        assert_eq!(sample.cooldown, Some(Duration::from_secs(600)));

        let sample: Sample = toml::from_str("every = \"10ms\"").unwrap();
        assert_eq!(sample.every, Duration::from_millis(10));
        assert_eq!(sample.cooldown, None);
    }

    #[test]
    fn test_rejects_garbage() {
        let result: Result<Sample, _> = toml::from_str("every = \"soon\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_writes_humantime_strings() {
        let sample = Sample {
            every: Duration::from_secs(90),
            cooldown: None,
        };
        let rendered = toml::to_string(&sample).unwrap();
        assert!(rendered.contains("every = \"1m 30s\""));
        assert!(!rendered.contains("cooldown"));
    }
}
