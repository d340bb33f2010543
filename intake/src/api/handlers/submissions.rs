//! Survey submission: validate, number, store receipts, insert.

use chrono::Utc;
use futures::future::join_all;
use tracing::{error, info, instrument, warn};

use crate::{
    AppState,
    api::models::{
        attachments::{AttachmentPayload, receipt_filename},
        submissions::{MESSAGE_ATTACHMENT_FAILED, MESSAGE_SAVE_FAILED, SurveySubmission, SurveySubmissionResponse},
    },
    config::AttachmentFailurePolicy,
    db::{
        errors::DbError,
        models::survey_responses::{SurveyResponse, SurveyResponseCreateDBRequest},
    },
    errors::Result,
    retry::with_retry,
    storage::ObjectStore,
    types::SurveyId,
};

/// Handle one submission.
///
/// Validation, ID allocation, attachment and insert failures are all reported in the returned
/// payload with `success: false`; this never returns `Err` for them.
#[instrument(skip_all, err)]
pub async fn submit_survey(state: &AppState, submission: &SurveySubmission) -> Result<SurveySubmissionResponse> {
    let missing = submission.missing_fields();
    if !missing.is_empty() {
        info!(?missing, "Rejected submission with missing fields");
        return Ok(SurveySubmissionResponse::missing(missing));
    }

    let retry = &state.config.retry;
    let survey_id = match with_retry(retry, "allocate_survey_id", || state.surveys.allocate_survey_id()).await {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "Failed to allocate survey ID");
            return Ok(SurveySubmissionResponse::failed(MESSAGE_SAVE_FAILED, e.to_string()));
        }
    };

    let (receipt_image_urls, failed_attachments) = match &submission.receipt_file {
        Some(files) => upload_receipts(state.object_store.as_ref(), survey_id, files.clone().into_vec()).await,
        None => (Vec::new(), Vec::new()),
    };

    if !failed_attachments.is_empty() && state.config.attachments.failure_policy == AttachmentFailurePolicy::Reject {
        warn!(%survey_id, failed = ?failed_attachments, "Rejecting submission with failed receipts");
        return Ok(SurveySubmissionResponse::failed(
            MESSAGE_ATTACHMENT_FAILED,
            format!("Could not store receipts: {}", failed_attachments.join(", ")),
        ));
    }

    let request = submission.to_db_request(survey_id, receipt_image_urls, Utc::now());
    let inserted = match with_retry(retry, "insert_survey_response", || state.surveys.insert(&request)).await {
        Err(e @ DbError::UniqueViolation { .. }) => recover_committed_insert(state, &request, e).await,
        other => other,
    };
    match inserted {
        Ok(row) => {
            info!(%survey_id, id = row.id, receipts = row.receipt_image_urls.len(), "Registered survey response");
            Ok(SurveySubmissionResponse::registered(survey_id, failed_attachments))
        }
        Err(e) => {
            error!(%survey_id, error = %e, "Failed to insert survey response");
            Ok(SurveySubmissionResponse::failed(MESSAGE_SAVE_FAILED, e.to_string()))
        }
    }
}

/// Resolve a survey ID conflict on insert.
///
/// A retried insert whose earlier attempt committed before the connection dropped collides with
/// its own row. That row counts as the insert result; a row written from another request does not.
async fn recover_committed_insert(
    state: &AppState,
    request: &SurveyResponseCreateDBRequest,
    conflict: DbError,
) -> std::result::Result<SurveyResponse, DbError> {
    match state.surveys.find_by_survey_id(&request.survey_id).await {
        Ok(Some(row)) if row.matches_request(request) => {
            warn!(survey_id = %request.survey_id, "Insert had already committed before a retry");
            Ok(row)
        }
        Ok(_) => Err(conflict),
        Err(e) => {
            warn!(survey_id = %request.survey_id, error = %e, "Could not check stored row after survey ID conflict");
            Err(conflict)
        }
    }
}

/// Decode and store every attachment concurrently.
///
/// Returns the public URLs of the stored receipts (in attachment order) and the filenames of the
/// ones that failed.
async fn upload_receipts(
    store: &dyn ObjectStore,
    survey_id: SurveyId,
    files: Vec<AttachmentPayload>,
) -> (Vec<String>, Vec<String>) {
    let total = files.len();
    let uploads = files.iter().enumerate().map(|(index, file)| async move {
        let filename = receipt_filename(survey_id, index, total, &file.extension());
        let result = match file.decode() {
            Ok(bytes) => {
                let content_type = file.storage_content_type(&filename);
                store.put(&filename, bytes, &content_type).await.map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };
        (filename, result)
    });

    let mut urls = Vec::with_capacity(total);
    let mut failed = Vec::new();
    for (filename, result) in join_all(uploads).await {
        match result {
            Ok(url) => urls.push(url),
            Err(error) => {
                warn!(%survey_id, filename = %filename, error = %error, "Receipt upload failed");
                failed.push(filename);
            }
        }
    }
    (urls, failed)
}
