//! Serde adapter for optional timeouts expressed as fractional seconds.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer, de};

pub(crate) fn serialize<S>(timeout: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match timeout {
        Some(duration) => serializer.serialize_f64(duration.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(seconds) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if !seconds.is_finite() || seconds.is_sign_negative() {
        return Err(de::Error::custom(format!(
            "timeout must be a finite, non-negative number of seconds (got {seconds})"
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|error| de::Error::custom(format!("timeout out of range: {error}")))
}
