//! The action-dispatched entry point: `GET|POST /?action=<name>`.

use std::fmt;
use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, de::DeserializeOwned};
use utoipa::IntoParams;

use super::{duplicates::check_duplicate, postcodes::get_postcode_data, submissions::submit_survey};
use crate::{
    AppState,
    api::models::{duplicates::DuplicateCheckRequest, submissions::SurveySubmission},
    errors::{Error, Result},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActionQuery {
    /// One of `getPostCodeData`, `checkDuplicate`, `submitSurvey`
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    GetPostCodeData,
    CheckDuplicate,
    SubmitSurvey,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::GetPostCodeData => "getPostCodeData",
            Action::CheckDuplicate => "checkDuplicate",
            Action::SubmitSurvey => "submitSurvey",
        }
    }

    /// Read-only actions may also be requested with GET
    fn allows(self, method: &Method) -> bool {
        *method == Method::POST || (*method == Method::GET && self == Action::GetPostCodeData)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [Action::GetPostCodeData, Action::CheckDuplicate, Action::SubmitSurvey]
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| Error::UnknownAction { action: s.to_string() })
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::BadRequest {
        message: format!("Invalid JSON body: {e}"),
    })
}

#[utoipa::path(
    method(get, post),
    path = "/",
    tag = "intake",
    summary = "Run an intake action",
    description = "Dispatches on the `action` query parameter. `getPostCodeData` returns \
        `[postcode, subdistrict, district, province]` tuples; `checkDuplicate` takes a \
        DuplicateCheckRequest and returns a DuplicateCheckResponse; `submitSurvey` takes a \
        SurveySubmission and returns a SurveySubmissionResponse.",
    params(ActionQuery),
    request_body(content = SurveySubmission, description = "Body for checkDuplicate or submitSurvey"),
    responses(
        (status = 200, description = "Action result", body = crate::api::models::submissions::SurveySubmissionResponse),
        (status = 400, description = "Unknown action or invalid body", body = crate::api::models::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::api::models::ErrorResponse),
    )
)]
#[tracing::instrument(skip_all, fields(method = %method, action = ?query.action))]
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<ActionQuery>,
    body: Bytes,
) -> Result<Response> {
    let action: Action = match query.action.as_deref() {
        None | Some("") => {
            return Err(Error::BadRequest {
                message: "Missing action query parameter".to_string(),
            });
        }
        Some(name) => name.parse()?,
    };

    if !action.allows(&method) {
        return Err(Error::BadRequest {
            message: format!("Action {action} does not support {method}"),
        });
    }

    match action {
        Action::GetPostCodeData => Ok(Json(get_postcode_data(&state).await?).into_response()),
        Action::CheckDuplicate => {
            let request: DuplicateCheckRequest = parse_body(&body)?;
            Ok(Json(check_duplicate(&state, &request).await?).into_response())
        }
        Action::SubmitSurvey => {
            let submission: SurveySubmission = parse_body(&body)?;
            Ok(Json(submit_survey(&state, &submission).await?).into_response())
        }
    }
}

/// Answer non-CORS `OPTIONS` requests with an empty 200
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
