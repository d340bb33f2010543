//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open transaction)
//! and exposes strongly-typed queries returning models from [`crate::db::models`].
//!
//! - [`Postcodes`]: paged reads of the postcode reference table
//! - [`SurveyResponses`]: survey inserts, contact lookups and ID counter access
//!
//! ```ignore
//! use intake::db::handlers::SurveyResponses;
//!
//! let mut tx = pool.begin().await?;
//! let mut repo = SurveyResponses::new(&mut tx);
//! let latest = repo.latest_survey_id().await?;
//! tx.commit().await?;
//! ```

pub mod postcodes;
pub mod survey_responses;

pub use postcodes::Postcodes;
pub use survey_responses::SurveyResponses;
