//! Database models for survey responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status written on every stored submission ("registered successfully")
pub const STATUS_REGISTERED: &str = "ลงทะเบียนสำเร็จ";

/// Database representation of a stored survey response
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SurveyResponse {
    pub id: i64,
    pub survey_id: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub gender: String,
    pub birth_day: String,
    pub birth_month: String,
    pub birth_year: String,
    pub occupation: String,
    pub monthly_income: String,
    pub house_number: String,
    pub village_or_building: String,
    pub moo: String,
    pub soi: String,
    pub road: String,
    pub subdistrict: String,
    pub district: String,
    pub province: String,
    pub postcode: String,
    pub phone: String,
    pub email: String,
    pub line_id: String,
    pub phone_normalized: String,
    pub email_normalized: String,
    pub pet_type: String,
    pub pet_count: String,
    pub pet_food_brand: String,
    pub purchase_channel: String,
    pub heard_from: String,
    pub accept_terms: bool,
    pub accept_privacy: bool,
    pub accept_marketing: bool,
    pub receipt_image_urls: Vec<String>,
    pub status: String,
    pub registration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SurveyResponse {
    /// Whether this row was written from `request` (ignoring server-set columns)
    pub fn matches_request(&self, request: &SurveyResponseCreateDBRequest) -> bool {
        self.survey_id == request.survey_id
            && self.first_name == request.first_name
            && self.last_name == request.last_name
            && self.phone == request.phone
            && self.email == request.email
            && self.house_number == request.house_number
            && self.receipt_image_urls == request.receipt_image_urls
    }
}

/// Request to insert a new survey response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponseCreateDBRequest {
    pub survey_id: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub gender: String,
    pub birth_day: String,
    pub birth_month: String,
    pub birth_year: String,
    pub occupation: String,
    pub monthly_income: String,
    pub house_number: String,
    pub village_or_building: String,
    pub moo: String,
    pub soi: String,
    pub road: String,
    pub subdistrict: String,
    pub district: String,
    pub province: String,
    pub postcode: String,
    pub phone: String,
    pub email: String,
    pub line_id: String,
    pub phone_normalized: String,
    pub email_normalized: String,
    pub pet_type: String,
    pub pet_count: String,
    pub pet_food_brand: String,
    pub purchase_channel: String,
    pub heard_from: String,
    pub accept_terms: bool,
    pub accept_privacy: bool,
    pub accept_marketing: bool,
    pub receipt_image_urls: Vec<String>,
    pub status: String,
    pub registration_date: DateTime<Utc>,
}

/// The columns of a stored response that duplicate detection looks at
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SurveyContact {
    pub survey_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub phone_normalized: String,
    pub email_normalized: String,
    pub house_number: String,
    pub village_or_building: String,
    pub moo: String,
    pub soi: String,
    pub road: String,
    pub subdistrict: String,
    pub district: String,
    pub province: String,
    pub postcode: String,
}

impl From<&SurveyResponse> for SurveyContact {
    fn from(row: &SurveyResponse) -> Self {
        Self {
            survey_id: row.survey_id.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            phone: row.phone.clone(),
            email: row.email.clone(),
            phone_normalized: row.phone_normalized.clone(),
            email_normalized: row.email_normalized.clone(),
            house_number: row.house_number.clone(),
            village_or_building: row.village_or_building.clone(),
            moo: row.moo.clone(),
            soi: row.soi.clone(),
            road: row.road.clone(),
            subdistrict: row.subdistrict.clone(),
            district: row.district.clone(),
            province: row.province.clone(),
            postcode: row.postcode.clone(),
        }
    }
}
