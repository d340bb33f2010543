//! Survey submission payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{attachments::ReceiptFiles, lenient_bool, lenient_string, or_empty, present};
use crate::db::models::survey_responses::{STATUS_REGISTERED, SurveyResponseCreateDBRequest};
use crate::matching::{normalize_phone, normalize_text};
use crate::types::SurveyId;

/// A completed survey form
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SurveySubmission {
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub last_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub nickname: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub birth_day: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub birth_month: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub birth_year: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub occupation: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub monthly_income: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub house_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub village_or_building: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub moo: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub soi: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub road: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub subdistrict: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub district: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub province: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub postcode: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub line_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub pet_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub pet_count: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub pet_food_brand: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub purchase_channel: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub heard_from: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub accept_terms: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub accept_privacy: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub accept_marketing: Option<bool>,
    /// One receipt image or several
    pub receipt_file: Option<ReceiptFiles>,
}

impl SurveySubmission {
    /// JSON names of required fields that are absent or blank, in a fixed order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let required: [(&'static str, &Option<String>); 7] = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("phone", &self.phone),
            ("houseNumber", &self.house_number),
            ("province", &self.province),
            ("district", &self.district),
            ("subdistrict", &self.subdistrict),
        ];
        required
            .into_iter()
            .filter(|(_, value)| present(value).is_none())
            .map(|(name, _)| name)
            .collect()
    }

    /// Full record to insert, with every absent optional field stored as empty
    pub fn to_db_request(
        &self,
        survey_id: SurveyId,
        receipt_image_urls: Vec<String>,
        registration_date: DateTime<Utc>,
    ) -> SurveyResponseCreateDBRequest {
        let phone = or_empty(&self.phone);
        let email = or_empty(&self.email);
        SurveyResponseCreateDBRequest {
            survey_id: survey_id.to_string(),
            title: or_empty(&self.title),
            first_name: or_empty(&self.first_name),
            last_name: or_empty(&self.last_name),
            nickname: or_empty(&self.nickname),
            gender: or_empty(&self.gender),
            birth_day: or_empty(&self.birth_day),
            birth_month: or_empty(&self.birth_month),
            birth_year: or_empty(&self.birth_year),
            occupation: or_empty(&self.occupation),
            monthly_income: or_empty(&self.monthly_income),
            house_number: or_empty(&self.house_number),
            village_or_building: or_empty(&self.village_or_building),
            moo: or_empty(&self.moo),
            soi: or_empty(&self.soi),
            road: or_empty(&self.road),
            subdistrict: or_empty(&self.subdistrict),
            district: or_empty(&self.district),
            province: or_empty(&self.province),
            postcode: or_empty(&self.postcode),
            phone_normalized: normalize_phone(&phone),
            email_normalized: normalize_text(&email),
            phone,
            email,
            line_id: or_empty(&self.line_id),
            pet_type: or_empty(&self.pet_type),
            pet_count: or_empty(&self.pet_count),
            pet_food_brand: or_empty(&self.pet_food_brand),
            purchase_channel: or_empty(&self.purchase_channel),
            heard_from: or_empty(&self.heard_from),
            accept_terms: self.accept_terms.unwrap_or(false),
            accept_privacy: self.accept_privacy.unwrap_or(false),
            accept_marketing: self.accept_marketing.unwrap_or(false),
            receipt_image_urls,
            status: STATUS_REGISTERED.to_string(),
            registration_date,
        }
    }
}

/// Result of a submission. Validation and storage failures are reported here with
/// `success: false` rather than as HTTP errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SurveySubmissionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub survey_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Receipt filenames that could not be decoded or stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_attachments: Option<Vec<String>>,
}

pub const MESSAGE_REGISTERED: &str = "ลงทะเบียนสำเร็จ";
pub const MESSAGE_MISSING_FIELDS: &str = "กรุณากรอกข้อมูลให้ครบถ้วน";
pub const MESSAGE_SAVE_FAILED: &str = "เกิดข้อผิดพลาดในการบันทึกข้อมูล";
pub const MESSAGE_ATTACHMENT_FAILED: &str = "ไม่สามารถอัปโหลดใบเสร็จได้";

impl SurveySubmissionResponse {
    pub fn registered(survey_id: SurveyId, failed_attachments: Vec<String>) -> Self {
        Self {
            success: true,
            message: MESSAGE_REGISTERED.to_string(),
            survey_id: Some(survey_id.to_string()),
            failed_attachments: (!failed_attachments.is_empty()).then_some(failed_attachments),
            ..Default::default()
        }
    }

    pub fn missing(fields: Vec<&'static str>) -> Self {
        Self {
            success: false,
            message: MESSAGE_MISSING_FIELDS.to_string(),
            missing_fields: Some(fields.into_iter().map(String::from).collect()),
            ..Default::default()
        }
    }

    pub fn failed(message: &str, error_detail: String) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error_detail: Some(error_detail),
            ..Default::default()
        }
    }
}
