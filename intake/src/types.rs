//! Strongly typed identifiers shared across the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SURVEY_ID_PREFIX: &str = "ATG";
const SURVEY_ID_DIGITS: usize = 8;

/// Human-readable survey identifier: `ATG` followed by a zero-padded 8-digit counter.
///
/// Ordering follows the numeric counter, so the greater of two IDs is the later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SurveyId(u64);

impl SurveyId {
    /// The value used when no valid survey ID has been stored yet (`ATG00000000`).
    pub const BASELINE: SurveyId = SurveyId(0);

    pub fn from_counter(counter: u64) -> Self {
        Self(counter)
    }

    pub fn counter(self) -> u64 {
        self.0
    }

    /// The ID directly after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Compute the ID to hand out after `latest`, the most recently stored survey ID.
    ///
    /// A missing or malformed value falls back to [`SurveyId::BASELINE`] before incrementing.
    pub fn following(latest: Option<&str>) -> Self {
        latest.and_then(|raw| raw.parse().ok()).unwrap_or(Self::BASELINE).next()
    }
}

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SURVEY_ID_PREFIX}{:0width$}", self.0, width = SURVEY_ID_DIGITS)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("'{0}' is not a survey ID (expected ATG followed by digits)")]
pub struct InvalidSurveyId(String);

impl FromStr for SurveyId {
    type Err = InvalidSurveyId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .strip_prefix(SURVEY_ID_PREFIX)
            .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| InvalidSurveyId(s.to_string()))?;

        digits.parse().map(SurveyId).map_err(|_| InvalidSurveyId(s.to_string()))
    }
}

impl From<SurveyId> for String {
    fn from(id: SurveyId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SurveyId {
    type Error = InvalidSurveyId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
