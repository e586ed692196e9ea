//! Utility functions used by Gander, and available when writing custom runners.

use colored::Colorize;
use serde::de::{self, Deserializer, Unexpected};
use serde::Deserialize;

/// Cut strings when they're too long to display.
///
/// If a string is longer than `limit` characters, only the first `limit - 3`
/// characters are kept and `...` is appended, so the result is exactly `limit`
/// characters long.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// // Everything past the 7th character is replaced with "...".
/// assert_eq!(util::cut_msg("this is a long string", 10), "this is...");
///
/// // Short strings are returned unchanged.
/// assert_eq!(util::cut_msg("short", 50), "short");
/// ```
pub fn cut_msg(msg: &str, limit: usize) -> String {
    if msg.chars().count() > limit {
        let kept: String = msg.chars().take(limit.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        msg.to_string()
    }
}

/// Colorize an HTTP status code for terminal output.
///
/// 2xx is green, 4xx is yellow and 5xx is red. Anything else is returned as is.
/// Coloring can be disabled globally with `colored::control::set_override(false)`.
pub fn color_status_code(status_code: u16) -> String {
    let text = status_code.to_string();
    match status_code {
        200..=299 => text.green().to_string(),
        400..=499 => text.yellow().to_string(),
        500..=599 => text.red().to_string(),
        _ => text,
    }
}

/// Parse the boolean spellings accepted in INI files.
///
/// # Example
/// ```rust
/// use gander::util;
///
/// assert_eq!(util::parse_bool("Yes"), Some(true));
/// assert_eq!(util::parse_bool("0"), Some(false));
/// assert_eq!(util::parse_bool("maybe"), None);
/// ```
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// Servers and hand-written plan files are loose about numbers: accept integers,
// floats and numeric strings alike.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Unsigned(u64),
    Float(f64),
    Text(String),
}

/// Deserialize a non-negative number of seconds given as an integer, a float or a
/// numeric string. Fractions are kept with millisecond precision.
pub fn deserialize_seconds<'de, D>(deserializer: D) -> Result<chrono::Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match LooseNumber::deserialize(deserializer)? {
        LooseNumber::Unsigned(s) => s as f64,
        LooseNumber::Float(s) => s,
        LooseNumber::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            de::Error::invalid_value(Unexpected::Str(&s), &"a number of seconds")
        })?,
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(de::Error::invalid_value(
            Unexpected::Float(seconds),
            &"a non-negative number of seconds",
        ));
    }
    let milliseconds = (seconds * 1000.0).round();
    if milliseconds >= i64::MAX as f64 {
        return Err(de::Error::invalid_value(
            Unexpected::Float(seconds),
            &"a number of seconds that fits a duration",
        ));
    }
    chrono::Duration::try_milliseconds(milliseconds as i64).ok_or_else(|| {
        de::Error::invalid_value(
            Unexpected::Float(seconds),
            &"a number of seconds that fits a duration",
        )
    })
}

/// Deserialize a count given as an integer or a numeric string.
pub fn deserialize_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    match LooseNumber::deserialize(deserializer)? {
        LooseNumber::Unsigned(n) => Ok(n as usize),
        LooseNumber::Float(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as usize),
        LooseNumber::Float(f) => Err(de::Error::invalid_value(
            Unexpected::Float(f),
            &"a non-negative integer",
        )),
        LooseNumber::Text(s) => s
            .trim()
            .parse::<usize>()
            .map_err(|_| de::Error::invalid_value(Unexpected::Str(&s), &"a non-negative integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Expiry {
        #[serde(deserialize_with = "deserialize_seconds")]
        expires_in: chrono::Duration,
    }

    #[derive(Deserialize)]
    struct Count {
        #[serde(deserialize_with = "deserialize_count")]
        count: usize,
    }

    #[test]
    fn cut() {
        assert_eq!(cut_msg("abcdefghij", 10), "abcdefghij");
        assert_eq!(cut_msg("abcdefghijk", 10), "abcdefg...");
        assert_eq!(cut_msg("", 5), "");
        // Multi-byte characters are counted, not bytes.
        assert_eq!(cut_msg("ééééééé", 6), "ééé...");
    }

    #[test]
    fn status_colors() {
        colored::control::set_override(false);
        assert_eq!(color_status_code(200), "200");
        assert_eq!(color_status_code(302), "302");
        colored::control::unset_override();
    }

    #[test]
    fn seconds() {
        let e: Expiry = serde_json::from_str(r#"{"expires_in": 300}"#).unwrap();
        assert_eq!(e.expires_in, chrono::Duration::seconds(300));
        let e: Expiry = serde_json::from_str(r#"{"expires_in": "60"}"#).unwrap();
        assert_eq!(e.expires_in, chrono::Duration::seconds(60));
        let e: Expiry = serde_json::from_str(r#"{"expires_in": 1.5}"#).unwrap();
        assert_eq!(e.expires_in, chrono::Duration::milliseconds(1500));
        assert!(serde_json::from_str::<Expiry>(r#"{"expires_in": -1}"#).is_err());
        assert!(serde_json::from_str::<Expiry>(r#"{"expires_in": "soon"}"#).is_err());
        // Finite, but past what a duration holds.
        assert!(serde_json::from_str::<Expiry>(r#"{"expires_in": 1e16}"#).is_err());
        assert!(serde_json::from_str::<Expiry>(r#"{"expires_in": 1e300}"#).is_err());
    }

    #[test]
    fn counts() {
        let c: Count = serde_json::from_str(r#"{"count": 3}"#).unwrap();
        assert_eq!(c.count, 3);
        let c: Count = serde_json::from_str(r#"{"count": "7"}"#).unwrap();
        assert_eq!(c.count, 7);
        assert!(serde_json::from_str::<Count>(r#"{"count": 2.5}"#).is_err());
    }
}
