//! Retry and prompt text configuration

use serde::{Deserialize, Deserializer};

use crate::domain::conversation::BackoffOptions;

/// Backoff schedules in milliseconds; unset keeps the built-in schedule
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetryConfig {
    #[serde(default, deserialize_with = "schedule")]
    pub backoff_on_throttling_ms: Option<Vec<u64>>,
    #[serde(default, deserialize_with = "schedule")]
    pub backoff_on_server_error_ms: Option<Vec<u64>>,
    #[serde(default, deserialize_with = "schedule")]
    pub backoff_on_connectivity_error_ms: Option<Vec<u64>>,
    #[serde(default, deserialize_with = "schedule")]
    pub backoff_on_download_error_ms: Option<Vec<u64>>,
}

impl RetryConfig {
    /// Env keys holding comma-separated lists
    pub(crate) const LIST_KEYS: [&'static str; 4] = [
        "retry.backoff_on_throttling_ms",
        "retry.backoff_on_server_error_ms",
        "retry.backoff_on_connectivity_error_ms",
        "retry.backoff_on_download_error_ms",
    ];

    /// Schedules set here, as an override layer
    pub fn backoff(&self) -> BackoffOptions {
        BackoffOptions {
            on_throttling: self.backoff_on_throttling_ms.clone(),
            on_server_error: self.backoff_on_server_error_ms.clone(),
            on_connectivity_error: self.backoff_on_connectivity_error_ms.clone(),
            on_download_error: self.backoff_on_download_error_ms.clone(),
        }
    }
}

// Split env lists hold strings; a lone value is parsed as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum Millis {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Schedule {
    Many(Vec<Millis>),
    One(Millis),
}

fn schedule<'de, D>(deserializer: D) -> Result<Option<Vec<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Schedule::deserialize(deserializer)? {
        Schedule::Many(items) => items,
        Schedule::One(item) => vec![item],
    };
    items
        .into_iter()
        .filter(|item| !matches!(item, Millis::Text(text) if text.trim().is_empty()))
        .map(|item| match item {
            Millis::Number(ms) => Ok(ms),
            Millis::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Default prompt texts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptsConfig {
    /// Replaces the built-in system prompt
    pub system_prompt_text: Option<String>,

    /// Sent once, right after the media
    pub start_prompt_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorClass;

    #[test]
    fn test_unset_schedules_stay_unset() {
        let config = RetryConfig {
            backoff_on_server_error_ms: Some(vec![100, 200]),
            ..Default::default()
        };
        let backoff = config.backoff();
        assert_eq!(backoff.schedule(ErrorClass::Server), &[100, 200]);
        assert_eq!(backoff.on_throttling, None);
    }

    #[test]
    fn test_schedule_accepts_lists_and_single_values() {
        let config: RetryConfig = serde_json::from_value(serde_json::json!({
            "backoff_on_throttling_ms": ["100", " 200"],
            "backoff_on_server_error_ms": 500,
            "backoff_on_download_error_ms": [],
        }))
        .unwrap();

        assert_eq!(config.backoff_on_throttling_ms, Some(vec![100, 200]));
        assert_eq!(config.backoff_on_server_error_ms, Some(vec![500]));
        assert_eq!(config.backoff_on_connectivity_error_ms, None);
        assert_eq!(config.backoff_on_download_error_ms, Some(vec![]));
    }

    #[test]
    fn test_schedule_rejects_garbage() {
        let result: Result<RetryConfig, _> = serde_json::from_value(serde_json::json!({
            "backoff_on_throttling_ms": ["soon"],
        }));
        assert!(result.is_err());
    }
}
