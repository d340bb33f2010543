//! In-memory stores and state builders for handler and router tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    AppState, Application,
    config::Config,
    db::{
        errors::{DbError, Result},
        models::{
            postcodes::PostcodeRecord,
            survey_responses::{SurveyContact, SurveyResponse, SurveyResponseCreateDBRequest},
        },
        store::{PostcodeSource, SurveyStore},
    },
    matching::{normalize_phone, normalize_text},
    retry::RetryConfig,
    storage::{self, ObjectStore, StorageError},
    types::SurveyId,
};

pub const TEST_PUBLIC_BASE_URL: &str = "https://receipts.test";

/// Postcode and survey store backed by vectors, with counters for assertions
#[derive(Default)]
pub struct MemoryStore {
    postcodes: Vec<PostcodeRecord>,
    contacts: Mutex<Vec<SurveyContact>>,
    inserted: Mutex<Vec<SurveyResponse>>,
    fail_postcode_reads: bool,
    pending_insert_failures: AtomicUsize,
    drop_after_next_insert: AtomicBool,
    counter: AtomicU64,
    postcode_page_reads: AtomicUsize,
    contact_page_reads: AtomicUsize,
    contact_lookups: AtomicUsize,
    allocations: AtomicUsize,
    insert_attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn with_postcodes(mut self, postcodes: Vec<PostcodeRecord>) -> Self {
        self.postcodes = postcodes;
        self
    }

    pub fn with_contacts(self, contacts: Vec<SurveyContact>) -> Self {
        *self.contacts.lock().unwrap() = contacts;
        self
    }

    pub fn failing_postcode_reads(mut self) -> Self {
        self.fail_postcode_reads = true;
        self
    }

    /// Make the next `n` inserts fail with a transient error
    pub fn fail_next_inserts(&self, n: usize) {
        self.pending_insert_failures.store(n, Ordering::SeqCst);
    }

    /// Commit the next insert, then report a dropped connection to the caller
    pub fn drop_connection_after_next_insert(&self) {
        self.drop_after_next_insert.store(true, Ordering::SeqCst);
    }

    pub fn postcode_page_reads(&self) -> usize {
        self.postcode_page_reads.load(Ordering::SeqCst)
    }

    pub fn contact_page_reads(&self) -> usize {
        self.contact_page_reads.load(Ordering::SeqCst)
    }

    pub fn contact_lookups(&self) -> usize {
        self.contact_lookups.load(Ordering::SeqCst)
    }

    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    pub fn inserted(&self) -> Vec<SurveyResponse> {
        self.inserted.lock().unwrap().clone()
    }
}

fn page<T: Clone>(items: &[T], offset: i64, limit: i64) -> Vec<T> {
    let start = usize::try_from(offset).unwrap_or(0).min(items.len());
    let end = start.saturating_add(usize::try_from(limit).unwrap_or(0)).min(items.len());
    items[start..end].to_vec()
}

#[async_trait]
impl PostcodeSource for MemoryStore {
    async fn fetch_page(&self, offset: i64, limit: i64) -> Result<Vec<PostcodeRecord>> {
        self.postcode_page_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_postcode_reads {
            return Err(DbError::Other(anyhow::anyhow!("postcode table unavailable")));
        }
        Ok(page(&self.postcodes, offset, limit))
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn allocate_survey_id(&self) -> Result<SurveyId> {
        self.allocations.fetch_add(1, Ordering::SeqCst);
        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SurveyId::from_counter(counter))
    }

    async fn list_contacts(&self, offset: i64, limit: i64) -> Result<Vec<SurveyContact>> {
        self.contact_page_reads.fetch_add(1, Ordering::SeqCst);
        Ok(page(&self.contacts.lock().unwrap(), offset, limit))
    }

    async fn find_by_contact(&self, phone_normalized: Option<&str>, email_normalized: Option<&str>) -> Result<Option<SurveyContact>> {
        self.contact_lookups.fetch_add(1, Ordering::SeqCst);
        let contacts = self.contacts.lock().unwrap();
        Ok(contacts
            .iter()
            .find(|c| {
                phone_normalized.is_some_and(|p| c.phone_normalized == p)
                    || email_normalized.is_some_and(|e| c.email_normalized == e)
            })
            .cloned())
    }

    async fn insert(&self, request: &SurveyResponseCreateDBRequest) -> Result<SurveyResponse> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .pending_insert_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DbError::Transient(sqlx::Error::PoolTimedOut));
        }

        let mut inserted = self.inserted.lock().unwrap();
        if inserted.iter().any(|row| row.survey_id == request.survey_id) {
            return Err(DbError::UniqueViolation {
                constraint: Some("survey_responses_survey_id_key".to_string()),
                table: Some("survey_responses".to_string()),
                message: format!("duplicate survey_id {}", request.survey_id),
            });
        }

        let row = response_from_request(inserted.len() as i64 + 1, request);
        self.contacts.lock().unwrap().push(SurveyContact::from(&row));
        inserted.push(row.clone());

        if self.drop_after_next_insert.swap(false, Ordering::SeqCst) {
            let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer");
            return Err(DbError::from(sqlx::Error::Io(reset)));
        }
        Ok(row)
    }

    async fn find_by_survey_id(&self, survey_id: &str) -> Result<Option<SurveyResponse>> {
        Ok(self.inserted.lock().unwrap().iter().find(|row| row.survey_id == survey_id).cloned())
    }
}

fn response_from_request(id: i64, r: &SurveyResponseCreateDBRequest) -> SurveyResponse {
    SurveyResponse {
        id,
        survey_id: r.survey_id.clone(),
        title: r.title.clone(),
        first_name: r.first_name.clone(),
        last_name: r.last_name.clone(),
        nickname: r.nickname.clone(),
        gender: r.gender.clone(),
        birth_day: r.birth_day.clone(),
        birth_month: r.birth_month.clone(),
        birth_year: r.birth_year.clone(),
        occupation: r.occupation.clone(),
        monthly_income: r.monthly_income.clone(),
        house_number: r.house_number.clone(),
        village_or_building: r.village_or_building.clone(),
        moo: r.moo.clone(),
        soi: r.soi.clone(),
        road: r.road.clone(),
        subdistrict: r.subdistrict.clone(),
        district: r.district.clone(),
        province: r.province.clone(),
        postcode: r.postcode.clone(),
        phone: r.phone.clone(),
        email: r.email.clone(),
        line_id: r.line_id.clone(),
        phone_normalized: r.phone_normalized.clone(),
        email_normalized: r.email_normalized.clone(),
        pet_type: r.pet_type.clone(),
        pet_count: r.pet_count.clone(),
        pet_food_brand: r.pet_food_brand.clone(),
        purchase_channel: r.purchase_channel.clone(),
        heard_from: r.heard_from.clone(),
        accept_terms: r.accept_terms,
        accept_privacy: r.accept_privacy,
        accept_marketing: r.accept_marketing,
        receipt_image_urls: r.receipt_image_urls.clone(),
        status: r.status.clone(),
        registration_date: r.registration_date,
        created_at: Utc::now(),
    }
}

/// Object store that keeps uploads in a map
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
    failing_keys: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    /// Make every upload to `key` fail
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().push(key.to_string());
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> storage::Result<String> {
        storage::validate_key(key)?;
        if self.failing_keys.lock().unwrap().iter().any(|k| k == key) {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "simulated upload failure".to_string(),
            });
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(storage::public_url(TEST_PUBLIC_BASE_URL, key))
    }
}

/// `n` postcode rows with ascending five-digit postcodes starting at 10000
pub fn postcode_rows(n: usize) -> Vec<PostcodeRecord> {
    (0..n)
        .map(|i| PostcodeRecord {
            postcode: format!("{}", 10000 + i),
            subdistrict: format!("ตำบล {i}"),
            district: format!("อำเภอ {i}"),
            province: format!("จังหวัด {i}"),
        })
        .collect()
}

/// A stored contact with the given phone and email and everything else blank
pub fn contact(survey_id: &str, phone: &str, email: &str) -> SurveyContact {
    SurveyContact {
        survey_id: survey_id.to_string(),
        phone: phone.to_string(),
        email: email.to_string(),
        phone_normalized: normalize_phone(phone),
        email_normalized: normalize_text(email),
        ..Default::default()
    }
}

/// Default configuration with millisecond retry backoff
pub fn test_config() -> Config {
    Config {
        retry: RetryConfig {
            backoff_ms: 1,
            max_backoff_ms: 5,
            ..RetryConfig::default()
        },
        ..Config::default()
    }
}

pub fn test_state(store: Arc<MemoryStore>) -> AppState {
    test_state_with_config(store, test_config())
}

pub fn test_state_with_config(store: Arc<MemoryStore>, config: Config) -> AppState {
    test_state_with(store, Arc::new(MemoryObjectStore::default()), config)
}

pub fn test_state_with(store: Arc<MemoryStore>, objects: Arc<MemoryObjectStore>, config: Config) -> AppState {
    let postcodes: Arc<dyn PostcodeSource> = store.clone();
    let surveys: Arc<dyn SurveyStore> = store;
    let object_store: Arc<dyn ObjectStore> = objects;
    AppState::builder()
        .config(config)
        .postcodes(postcodes)
        .surveys(surveys)
        .object_store(object_store)
        .build()
}

/// Full router over `store` with the test configuration
pub fn test_server(store: Arc<MemoryStore>) -> axum_test::TestServer {
    Application::from_state(test_state(store))
        .expect("Failed to build application")
        .into_test_server()
}
