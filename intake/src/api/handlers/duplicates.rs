//! Duplicate registration check.

use tracing::{info, instrument};

use crate::{
    AppState,
    api::models::duplicates::{DuplicateCheckRequest, DuplicateCheckResponse},
    config::DuplicatePolicy,
    errors::Result,
    matching::{ContactProfile, DuplicateReason},
};

/// Decide whether `request` duplicates a stored registration, using the configured policy
#[instrument(skip_all, fields(policy = ?state.config.duplicates.policy), err)]
pub async fn check_duplicate(state: &AppState, request: &DuplicateCheckRequest) -> Result<DuplicateCheckResponse> {
    let reason = match state.config.duplicates.policy {
        DuplicatePolicy::Heuristic => heuristic_scan(state, &request.profile()).await?,
        DuplicatePolicy::Indexed => indexed_lookup(state, request).await?,
    };
    Ok(DuplicateCheckResponse::from(reason))
}

/// Compare against every stored response, oldest first, and stop at the first match
async fn heuristic_scan(state: &AppState, candidate: &ContactProfile) -> Result<Option<DuplicateReason>> {
    let batch_size = i64::from(state.config.duplicates.scan_batch_size);
    let threshold = state.config.duplicates.address_similarity_threshold;
    let mut offset = 0;

    loop {
        let page = state.surveys.list_contacts(offset, batch_size).await?;
        for contact in &page {
            if let Some(reason) = candidate.duplicate_reason(&ContactProfile::from(contact), threshold) {
                info!(existing = %contact.survey_id, ?reason, "Duplicate registration found");
                return Ok(Some(reason));
            }
        }

        if (page.len() as i64) < batch_size {
            return Ok(None);
        }
        offset += batch_size;
    }
}

/// Single lookup on normalized phone OR email; no name or address rules
async fn indexed_lookup(state: &AppState, request: &DuplicateCheckRequest) -> Result<Option<DuplicateReason>> {
    let phone = request.phone_key();
    let email = request.email_key();
    if phone.is_none() && email.is_none() {
        return Ok(None);
    }

    let existing = state.surveys.find_by_contact(phone.as_deref(), email.as_deref()).await?;
    Ok(existing.map(|contact| {
        let reason = if phone.as_deref() == Some(contact.phone_normalized.as_str()) {
            DuplicateReason::Phone
        } else {
            DuplicateReason::Email
        };
        info!(existing = %contact.survey_id, ?reason, "Duplicate registration found");
        reason
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::models::survey_responses::SurveyContact;
    use crate::test_utils::{MemoryStore, contact, test_state, test_state_with_config};
    use std::sync::Arc;

    fn request(phone: &str, email: &str, first: &str, last: &str) -> DuplicateCheckRequest {
        DuplicateCheckRequest {
            phone: Some(phone.to_string()),
            email: Some(email.to_string()),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            ..Default::default()
        }
    }

    fn indexed_config() -> Config {
        let mut config = Config::default();
        config.duplicates.policy = DuplicatePolicy::Indexed;
        config
    }

    #[tokio::test]
    async fn international_phone_matches_local_form_heuristically() {
        let store = Arc::new(MemoryStore::default().with_contacts(vec![contact("ATG00000001", "0812345678", "")]));
        let state = test_state(store);

        let result = check_duplicate(&state, &request("+66812345678", "", "", "")).await.unwrap();

        assert!(result.is_duplicate);
        assert_eq!(result.reason, "เบอร์โทรศัพท์นี้ได้ลงทะเบียนแล้ว");
    }

    #[tokio::test]
    async fn international_phone_matches_local_form_indexed() {
        let store = Arc::new(MemoryStore::default().with_contacts(vec![contact("ATG00000001", "0812345678", "")]));
        let state = test_state_with_config(store, indexed_config());

        let result = check_duplicate(&state, &request("+66812345678", "", "", "")).await.unwrap();

        assert!(result.is_duplicate);
        assert_eq!(result.reason, DuplicateReason::Phone.to_string());
    }

    #[tokio::test]
    async fn indexed_policy_reports_email_and_ignores_names() {
        let store = Arc::new(MemoryStore::default().with_contacts(vec![SurveyContact {
            first_name: "Somchai".into(),
            last_name: "Jaidee".into(),
            ..contact("ATG00000001", "0899999999", "somchai@example.com")
        }]));
        let state = test_state_with_config(store, indexed_config());

        let by_email = check_duplicate(&state, &request("0811111111", "SOMCHAI@example.com", "", ""))
            .await
            .unwrap();
        assert_eq!(by_email.reason, DuplicateReason::Email.to_string());

        let by_name = check_duplicate(&state, &request("0811111111", "", "Somchai", "Jaidee")).await.unwrap();
        assert_eq!(by_name, DuplicateCheckResponse::unique());
    }

    #[tokio::test]
    async fn indexed_policy_without_contact_details_is_never_duplicate() {
        let store = Arc::new(MemoryStore::default().with_contacts(vec![contact("ATG00000001", "", "")]));
        let state = test_state_with_config(store.clone(), indexed_config());

        let result = check_duplicate(&state, &request(" ", "", "A", "B")).await.unwrap();

        assert!(!result.is_duplicate);
        assert_eq!(store.contact_lookups(), 0);
    }

    #[tokio::test]
    async fn heuristic_scan_pages_through_all_responses() {
        let mut contacts: Vec<_> = (0..25)
            .map(|i| contact(&format!("ATG{:08}", i + 1), &format!("08000000{i:02}"), ""))
            .collect();
        contacts.push(SurveyContact {
            first_name: "Malee".into(),
            last_name: "Suksan".into(),
            ..contact("ATG00000026", "0899999999", "")
        });
        let store = Arc::new(MemoryStore::default().with_contacts(contacts));
        let mut config = Config::default();
        config.duplicates.scan_batch_size = 10;
        let state = test_state_with_config(store.clone(), config);

        let result = check_duplicate(&state, &request("0811111111", "", " malee ", "SUKSAN")).await.unwrap();

        assert_eq!(result.reason, DuplicateReason::Name.to_string());
        assert_eq!(store.contact_page_reads(), 3);
    }

    #[tokio::test]
    async fn heuristic_scan_matches_similar_address() {
        let stored = SurveyContact {
            house_number: "123".into(),
            road: "Sukhumvit".into(),
            subdistrict: "Khlong Toei".into(),
            district: "Khlong Toei".into(),
            province: "Bangkok".into(),
            postcode: "10110".into(),
            ..contact("ATG00000001", "0899999999", "")
        };
        let store = Arc::new(MemoryStore::default().with_contacts(vec![stored]));
        let state = test_state(store);

        let mut candidate = request("0811111111", "", "", "");
        candidate.house_number = Some("124".into());
        candidate.road = Some("sukhumvit".into());
        candidate.subdistrict = Some("Khlong Toei".into());
        candidate.district = Some("Khlong Toei".into());
        candidate.province = Some("Bangkok".into());
        candidate.postcode = Some("10110".into());

        let result = check_duplicate(&state, &candidate).await.unwrap();
        assert_eq!(result.reason, DuplicateReason::Address.to_string());
    }

    #[tokio::test]
    async fn no_match_in_empty_store() {
        let state = test_state(Arc::new(MemoryStore::default()));
        let result = check_duplicate(&state, &request("0812345678", "a@b.c", "A", "B")).await.unwrap();
        assert_eq!(result, DuplicateCheckResponse::unique());
    }
}
