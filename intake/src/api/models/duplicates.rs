//! Duplicate check payloads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{lenient_string, present};
use crate::matching::{AddressParts, ContactProfile, DuplicateReason, normalize_phone, normalize_text};

/// Candidate registration to compare against stored responses
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateCheckRequest {
    #[serde(deserialize_with = "lenient_string")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub village_or_building: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub house_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub moo: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub soi: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub road: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub province: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub district: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub subdistrict: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub postcode: Option<String>,
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

impl DuplicateCheckRequest {
    pub fn profile(&self) -> ContactProfile {
        ContactProfile::new(
            field(&self.phone),
            field(&self.email),
            field(&self.first_name),
            field(&self.last_name),
            AddressParts {
                house_number: field(&self.house_number),
                village_or_building: field(&self.village_or_building),
                moo: field(&self.moo),
                soi: field(&self.soi),
                road: field(&self.road),
                subdistrict: field(&self.subdistrict),
                district: field(&self.district),
                province: field(&self.province),
                postcode: field(&self.postcode),
            },
        )
    }

    /// Normalized phone for the indexed lookup, `None` when blank or digit-free
    pub fn phone_key(&self) -> Option<String> {
        present(&self.phone).map(normalize_phone).filter(|p| !p.is_empty())
    }

    /// Normalized email for the indexed lookup, `None` when blank
    pub fn email_key(&self) -> Option<String> {
        present(&self.email).map(normalize_text)
    }
}

/// Outcome of a duplicate check. `reason` is empty when `isDuplicate` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheckResponse {
    pub is_duplicate: bool,
    pub reason: String,
}

impl DuplicateCheckResponse {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            reason: String::new(),
        }
    }

    pub fn duplicate(reason: DuplicateReason) -> Self {
        Self {
            is_duplicate: true,
            reason: reason.to_string(),
        }
    }
}

impl From<Option<DuplicateReason>> for DuplicateCheckResponse {
    fn from(reason: Option<DuplicateReason>) -> Self {
        reason.map_or_else(Self::unique, Self::duplicate)
    }
}
