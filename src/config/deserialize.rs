// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Validates service names and health attempt counts as they are read from YAML.

use serde::Deserialize;

use crate::types::ServiceName;

pub fn deserialize_service_name_opt<'de, D>(deserializer: D) -> Result<Option<ServiceName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => ServiceName::new(s.trim())
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

pub fn deserialize_service_names<'de, D>(deserializer: D) -> Result<Vec<ServiceName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Option<Vec<String>> = Option::deserialize(deserializer)?;
    values
        .unwrap_or_default()
        .iter()
        .map(|s| ServiceName::new(s.trim()).map_err(serde::de::Error::custom))
        .collect()
}

pub fn deserialize_attempts<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match u32::deserialize(deserializer)? {
        0 => Err(serde::de::Error::custom(
            "health_timeout must allow at least one attempt",
        )),
        attempts => Ok(attempts),
    }
}
