//! Storage seams used by the request handlers.
//!
//! [`PostcodeSource`] and [`SurveyStore`] describe the request/response calls the handlers make
//! against the relational store. [`PgStore`] implements both over a PostgreSQL pool.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::{
    errors::{DbError, Result},
    handlers::{Postcodes, SurveyResponses},
    models::{
        postcodes::PostcodeRecord,
        survey_responses::{SurveyContact, SurveyResponse, SurveyResponseCreateDBRequest},
    },
};
use crate::types::SurveyId;

/// Read access to the postcode reference table
#[async_trait]
pub trait PostcodeSource: Send + Sync {
    /// Fetch up to `limit` rows starting at `offset`, in table order
    async fn fetch_page(&self, offset: i64, limit: i64) -> Result<Vec<PostcodeRecord>>;
}

/// Access to stored survey responses
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Reserve the next survey ID.
    ///
    /// Implementations must never hand out the same ID twice, including to concurrent callers.
    async fn allocate_survey_id(&self) -> Result<SurveyId>;

    /// Page through existing responses (oldest first) for duplicate scanning
    async fn list_contacts(&self, offset: i64, limit: i64) -> Result<Vec<SurveyContact>>;

    /// First response whose normalized phone or email equals one of the given values
    async fn find_by_contact(&self, phone_normalized: Option<&str>, email_normalized: Option<&str>) -> Result<Option<SurveyContact>>;

    /// The stored response holding `survey_id`, if any
    async fn find_by_survey_id(&self, survey_id: &str) -> Result<Option<SurveyResponse>>;

    /// Insert a new response
    async fn insert(&self, request: &SurveyResponseCreateDBRequest) -> Result<SurveyResponse>;
}

/// PostgreSQL-backed implementation of both storage traits
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostcodeSource for PgStore {
    async fn fetch_page(&self, offset: i64, limit: i64) -> Result<Vec<PostcodeRecord>> {
        let mut conn = self.pool.acquire().await?;
        Postcodes::new(&mut conn).list_page(offset, limit).await
    }
}

#[async_trait]
impl SurveyStore for PgStore {
    /// Read-modify-write under the `survey_id_counter` row lock.
    ///
    /// The baseline is the greater of the latest stored survey ID and the last reserved counter,
    /// so IDs reserved by submissions that have not inserted yet are skipped.
    #[instrument(skip(self), err)]
    async fn allocate_survey_id(&self) -> Result<SurveyId> {
        let mut tx = self.pool.begin().await?;
        let mut repo = SurveyResponses::new(&mut tx);

        let reserved = repo.lock_id_counter().await?;
        let latest = repo.latest_survey_id().await?;

        let from_latest = SurveyId::following(latest.as_deref());
        let from_counter = SurveyId::from_counter(u64::try_from(reserved).unwrap_or(0)).next();
        let allocated = from_latest.max(from_counter);

        let counter = i64::try_from(allocated.counter())
            .map_err(|_| DbError::Other(anyhow::anyhow!("survey ID counter overflow at {allocated}")))?;
        repo.store_id_counter(counter).await?;
        tx.commit().await?;

        debug!(%allocated, latest = ?latest, reserved, "Allocated survey ID");
        Ok(allocated)
    }

    async fn list_contacts(&self, offset: i64, limit: i64) -> Result<Vec<SurveyContact>> {
        let mut conn = self.pool.acquire().await?;
        SurveyResponses::new(&mut conn).list_contacts(offset, limit).await
    }

    async fn find_by_contact(&self, phone_normalized: Option<&str>, email_normalized: Option<&str>) -> Result<Option<SurveyContact>> {
        let mut conn = self.pool.acquire().await?;
        SurveyResponses::new(&mut conn)
            .find_by_contact(phone_normalized, email_normalized)
            .await
    }

    async fn find_by_survey_id(&self, survey_id: &str) -> Result<Option<SurveyResponse>> {
        let mut conn = self.pool.acquire().await?;
        SurveyResponses::new(&mut conn).get_by_survey_id(survey_id).await
    }

    async fn insert(&self, request: &SurveyResponseCreateDBRequest) -> Result<SurveyResponse> {
        let mut conn = self.pool.acquire().await?;
        SurveyResponses::new(&mut conn).create(request).await
    }
}

#[cfg(all(test, feature = "postgres-tests"))]
mod tests {
    use super::*;
    use crate::db::models::survey_responses::STATUS_REGISTERED;
    use chrono::Utc;

    #[sqlx::test]
    async fn allocation_skips_ids_reserved_but_not_inserted(pool: PgPool) {
        let store = PgStore::new(pool);

        let first = store.allocate_survey_id().await.unwrap();
        let second = store.allocate_survey_id().await.unwrap();

        assert_eq!(first.to_string(), "ATG00000001");
        assert_eq!(second.to_string(), "ATG00000002");
    }

    #[sqlx::test]
    async fn allocation_continues_after_latest_stored_id(pool: PgPool) {
        let store = PgStore::new(pool);
        store
            .insert(&SurveyResponseCreateDBRequest {
                survey_id: "ATG00000099".to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                house_number: "1".to_string(),
                phone: "0800000000".to_string(),
                status: STATUS_REGISTERED.to_string(),
                registration_date: Utc::now(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(store.allocate_survey_id().await.unwrap().to_string(), "ATG00000100");
    }

    #[sqlx::test]
    async fn concurrent_allocations_are_distinct(pool: PgPool) {
        let store = PgStore::new(pool);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.allocate_survey_id().await.unwrap() })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
