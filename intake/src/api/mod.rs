//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: the action dispatcher and the three action handlers
//! - **[`models`]**: request/response payloads for each action
//!
//! # API Structure
//!
//! Everything is served from `/`, with the operation selected by the `action` query parameter:
//!
//! - `getPostCodeData` (GET or POST): the full postcode reference table
//! - `checkDuplicate` (POST): compare a candidate registration against stored ones
//! - `submitSurvey` (POST): validate, number, and store a registration with its receipts
//!
//! The generated OpenAPI document is served at `/api-docs/openapi.json`.

pub mod handlers;
pub mod models;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::dispatch::dispatch),
    components(schemas(
        models::duplicates::DuplicateCheckRequest,
        models::duplicates::DuplicateCheckResponse,
        models::submissions::SurveySubmission,
        models::submissions::SurveySubmissionResponse,
        models::attachments::ReceiptFiles,
        models::attachments::AttachmentPayload,
        models::ErrorResponse,
    )),
    tags((name = "intake", description = "Survey intake actions"))
)]
pub struct ApiDoc;
