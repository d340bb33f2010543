//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (api::handlers - one per action)
//! └──────┬──────┘
//!        │  Arc<dyn PostcodeSource>, Arc<dyn SurveyStore>
//!        ↓
//! ┌─────────────┐
//! │   PgStore   │  (db::store - pool, transactions, ID allocation)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! Handlers only see the traits in [`store`], which keeps them testable against in-memory
//! implementations. Migrations live in `migrations/` and are applied by [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
pub mod store;
