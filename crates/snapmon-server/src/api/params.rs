use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use utoipa::IntoParams;

/// Upper bound for `?limit=` on snapshot queries.
pub const MAX_LATEST_LIMIT: u64 = 1000;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LatestParams {
    /// Number of snapshots to return (server default when omitted, at most 1000)
    #[param(required = false)]
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub limit: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum U64Input {
    Number(u64),
    Text(String),
}

fn deserialize_optional_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<U64Input>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(U64Input::Number(number)) => Ok(Some(number)),
        Some(U64Input::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(U64Input::Text(text)) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(DeError::custom),
    }
}

impl LatestParams {
    pub fn limit(&self, default: u64) -> u64 {
        self.limit.unwrap_or(default).min(MAX_LATEST_LIMIT)
    }
}
