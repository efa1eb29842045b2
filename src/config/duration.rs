use std::time::Duration;

use serde::{Deserialize, Deserializer};

use super::ConfigError;

/// Suffix to nanoseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ns", 1.0),
    ("µs", 1_000.0),
    ("us", 1_000.0),
    ("ms", 1_000_000.0),
    ("s", 1_000_000_000.0),
    ("m", 60_000_000_000.0),
    ("h", 3_600_000_000_000.0),
];

/// Parse duration strings like "50ms", "1s", "1.5s", "2m", "250us"
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = |reason: &str| ConfigError::Duration {
        input: s.to_string(),
        reason: reason.to_string(),
    };

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str
                .trim()
                .parse()
                .map_err(|_| invalid("not a number"))?;
            if !val.is_finite() || val < 0.0 {
                return Err(invalid("must be a non-negative number"));
            }
            return Ok(Duration::from_nanos((val * multiplier) as u64));
        }
    }

    Err(invalid("missing unit (ns, us, ms, s, m, h)"))
}

/// Format a duration for display
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        "0ns".to_string()
    } else if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}µs", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

/// `deserialize_with` helper accepting "50ms"-style strings or plain
/// numbers of seconds.
pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(s) => parse_duration(&s).map_err(serde::de::Error::custom),
        Raw::Seconds(secs) => {
            Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
        }
    }
}
