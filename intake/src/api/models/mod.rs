//! API request and response data models.
//!
//! Request bodies come from a browser form, so text fields are accepted leniently: a JSON
//! string, number, or `null` (and absent) all deserialize, numbers being kept in their textual
//! form. Stored values default to empty strings.
//!
//! - [`duplicates`]: duplicate check request/result
//! - [`submissions`]: survey submission request/result
//! - [`attachments`]: base64 receipt descriptors and their naming rules

pub mod attachments;
pub mod duplicates;
pub mod submissions;

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Error body for 4xx/5xx responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseScalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

/// Accept a string, number, boolean or null where a text field is expected
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LooseScalar>::deserialize(deserializer)?.map(|value| match value {
        LooseScalar::Text(s) => s,
        LooseScalar::Integer(n) => n.to_string(),
        LooseScalar::Float(f) => f.to_string(),
        LooseScalar::Bool(b) => b.to_string(),
    }))
}

/// Accept `true`/`false`, `"true"`/`"false"`, `1`/`0`, or null for a consent flag
pub(crate) fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<LooseScalar>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match value {
        LooseScalar::Bool(b) => Ok(Some(b)),
        LooseScalar::Integer(0) => Ok(Some(false)),
        LooseScalar::Integer(1) => Ok(Some(true)),
        LooseScalar::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("expected a boolean, got {other:?}"))),
        },
        _ => Err(serde::de::Error::custom("expected a boolean")),
    }
}

/// Trimmed value, or `None` when absent or blank
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Value as stored: the raw text, or empty when absent
pub(crate) fn or_empty(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}
