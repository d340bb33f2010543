//! Database repository for survey responses and survey ID allocation.

use crate::db::{
    errors::Result,
    models::survey_responses::{SurveyContact, SurveyResponse, SurveyResponseCreateDBRequest},
};
use sqlx::PgConnection;
use tracing::instrument;

const CONTACT_COLUMNS: &str = "survey_id, first_name, last_name, phone, email, phone_normalized, email_normalized, \
     house_number, village_or_building, moo, soi, road, subdistrict, district, province, postcode";

pub struct SurveyResponses<'c> {
    db: &'c mut PgConnection,
}

impl<'c> SurveyResponses<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Survey ID of the most recently created response, if any
    #[instrument(skip(self), err)]
    pub async fn latest_survey_id(&mut self) -> Result<Option<String>> {
        let latest = sqlx::query_scalar::<_, String>(
            r#"
            SELECT survey_id
            FROM survey_responses
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(latest)
    }

    /// Lock the allocation counter row and return the last counter value handed out.
    ///
    /// The row lock is held until the surrounding transaction ends, so this must run inside one.
    #[instrument(skip(self), err)]
    pub async fn lock_id_counter(&mut self) -> Result<i64> {
        let last_value = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT last_value
            FROM survey_id_counter
            WHERE singleton
            FOR UPDATE
            "#,
        )
        .fetch_one(&mut *self.db)
        .await?;

        Ok(last_value)
    }

    #[instrument(skip(self), err)]
    pub async fn store_id_counter(&mut self, value: i64) -> Result<()> {
        sqlx::query("UPDATE survey_id_counter SET last_value = $1 WHERE singleton")
            .bind(value)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Page through the columns duplicate detection needs, oldest first
    #[instrument(skip(self), err)]
    pub async fn list_contacts(&mut self, offset: i64, limit: i64) -> Result<Vec<SurveyContact>> {
        let query = format!("SELECT {CONTACT_COLUMNS} FROM survey_responses ORDER BY id ASC OFFSET $1 LIMIT $2");
        let contacts = sqlx::query_as::<_, SurveyContact>(&query)
            .bind(offset)
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(contacts)
    }

    /// First response whose normalized phone or normalized email equals the given value.
    ///
    /// Empty stored values never match.
    #[instrument(skip(self), err)]
    pub async fn find_by_contact(&mut self, phone_normalized: Option<&str>, email_normalized: Option<&str>) -> Result<Option<SurveyContact>> {
        let query = format!(
            "SELECT {CONTACT_COLUMNS} FROM survey_responses \
             WHERE (phone_normalized <> '' AND phone_normalized = $1) \
                OR (email_normalized <> '' AND email_normalized = $2) \
             ORDER BY id ASC LIMIT 1"
        );
        let contact = sqlx::query_as::<_, SurveyContact>(&query)
            .bind(phone_normalized)
            .bind(email_normalized)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(contact)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_survey_id(&mut self, survey_id: &str) -> Result<Option<SurveyResponse>> {
        let row = sqlx::query_as::<_, SurveyResponse>("SELECT * FROM survey_responses WHERE survey_id = $1")
            .bind(survey_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(row)
    }

    /// Insert a new survey response
    #[instrument(skip(self, request), fields(survey_id = %request.survey_id), err)]
    pub async fn create(&mut self, request: &SurveyResponseCreateDBRequest) -> Result<SurveyResponse> {
        let row = sqlx::query_as::<_, SurveyResponse>(
            r#"
            INSERT INTO survey_responses (
                survey_id, title, first_name, last_name, nickname, gender,
                birth_day, birth_month, birth_year, occupation, monthly_income,
                house_number, village_or_building, moo, soi, road,
                subdistrict, district, province, postcode,
                phone, email, line_id, phone_normalized, email_normalized,
                pet_type, pet_count, pet_food_brand, purchase_channel, heard_from,
                accept_terms, accept_privacy, accept_marketing,
                receipt_image_urls, status, registration_date
            )
            VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16,
                $17, $18, $19, $20,
                $21, $22, $23, $24, $25,
                $26, $27, $28, $29, $30,
                $31, $32, $33,
                $34, $35, $36
            )
            RETURNING *
            "#,
        )
        .bind(&request.survey_id)
        .bind(&request.title)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.nickname)
        .bind(&request.gender)
        .bind(&request.birth_day)
        .bind(&request.birth_month)
        .bind(&request.birth_year)
        .bind(&request.occupation)
        .bind(&request.monthly_income)
        .bind(&request.house_number)
        .bind(&request.village_or_building)
        .bind(&request.moo)
        .bind(&request.soi)
        .bind(&request.road)
        .bind(&request.subdistrict)
        .bind(&request.district)
        .bind(&request.province)
        .bind(&request.postcode)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(&request.line_id)
        .bind(&request.phone_normalized)
        .bind(&request.email_normalized)
        .bind(&request.pet_type)
        .bind(&request.pet_count)
        .bind(&request.pet_food_brand)
        .bind(&request.purchase_channel)
        .bind(&request.heard_from)
        .bind(request.accept_terms)
        .bind(request.accept_privacy)
        .bind(request.accept_marketing)
        .bind(&request.receipt_image_urls)
        .bind(&request.status)
        .bind(request.registration_date)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row)
    }
}
