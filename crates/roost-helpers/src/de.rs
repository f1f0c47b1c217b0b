use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Deserializes a duration given either as integer seconds or as a
/// humantime string such as `"10s"` or `"1m 30s"`.
pub fn deserialize_duration<'de, D>(
    deserializer: D
) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Seconds(u64),
        Text(String),
    }

    match RawDuration::deserialize(deserializer)? {
        RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
        RawDuration::Text(text) => {
            humantime::parse_duration(text.trim()).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "super::deserialize_duration")]
        value: Duration,
    }

    #[test]
    fn accepts_integer_seconds() {
        let holder: Holder = serde_yaml::from_str("value: 30").unwrap();
        assert_eq!(holder.value, Duration::from_secs(30));
    }

    #[test]
    fn accepts_humantime_text() {
        let holder: Holder = serde_yaml::from_str("value: 1m 30s").unwrap();
        assert_eq!(holder.value, Duration::from_secs(90));
    }

    #[test]
    fn rejects_garbage() {
        let result: Result<Holder, _> = serde_yaml::from_str("value: soon");
        assert!(result.is_err());
    }
}
