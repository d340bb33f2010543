//! Database record structures matching table schemas.
//!
//! - [`postcodes`]: rows of the `postcodes` reference table
//! - [`survey_responses`]: submitted surveys and the projections used for duplicate checks

pub mod postcodes;
pub mod survey_responses;
