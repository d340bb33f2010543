//! HTTP request handlers.
//!
//! [`dispatch`] is the only routed handler for the survey API: it reads the `action` query
//! parameter, parses the JSON body into the action's request type, and calls one of the action
//! handlers. Action handlers take `&AppState` and a typed request, so they can be exercised
//! without going through HTTP.
//!
//! - [`postcodes`]: `getPostCodeData`
//! - [`duplicates`]: `checkDuplicate`
//! - [`submissions`]: `submitSurvey`

pub mod dispatch;
pub mod duplicates;
pub mod postcodes;
pub mod submissions;
