use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use tokio::time::Duration;

/// Formats a duration as a wall-clock string `HH:MM:SS:mmm`.
///
/// Hours are not wrapped at 24, so a 30 hour run renders as `30:00:00:000`.
pub fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let seconds = (total_ms / 1000) % 60;
    let milliseconds = total_ms % 1000;

    format!(
        "{:02}:{:02}:{:02}:{:03}",
        hours, minutes, seconds, milliseconds
    )
}

/// Parses a `HH:MM:SS:mmm` string produced by [`format_duration`].
pub fn parse_clock_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration string cannot be empty".to_string());
    }

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "Invalid clock duration '{}'. Expected 'HH:MM:SS:mmm'",
            s
        ));
    }

    let mut values = [0u64; 4];
    for (slot, part) in values.iter_mut().zip(parts.iter()) {
        *slot = u64::from_str(part)
            .map_err(|_| format!("Invalid numeric value in duration: '{}'", part))?;
    }

    let [hours, minutes, seconds, millis] = values;
    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(format!("Clock duration component out of range: '{}'", s));
    }

    Ok(Duration::from_millis(
        ((hours * 60 + minutes) * 60 + seconds) * 1000 + millis,
    ))
}

/// Seconds since the unix epoch, or 0 if the system clock is before it.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generates a 24 hex digit test identifier.
///
/// Layout matches a document-store object id: 4 big-endian bytes of unix
/// seconds followed by 8 random bytes, so ids sort roughly by creation time.
pub fn new_test_id() -> String {
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&(unix_timestamp() as u32).to_be_bytes());
    rand::thread_rng().fill_bytes(&mut bytes[4..]);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Returns true if `id` has the shape produced by [`new_test_id`].
pub fn is_valid_test_id(id: &str) -> bool {
    id.len() == 24 && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// Serde adapter rendering a `Duration` as a `HH:MM:SS:mmm` string.
pub mod clock {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_clock_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter rendering a `Duration` as integer nanoseconds.
pub mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_nanos(u64::deserialize(deserializer)?))
    }
}
