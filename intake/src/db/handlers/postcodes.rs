//! Database repository for postcode reference data.

use crate::db::{errors::Result, models::postcodes::PostcodeRecord};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Postcodes<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Postcodes<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Fetch one page of reference rows in table order
    #[instrument(skip(self), err)]
    pub async fn list_page(&mut self, offset: i64, limit: i64) -> Result<Vec<PostcodeRecord>> {
        let rows = sqlx::query_as::<_, PostcodeRecord>(
            r#"
            SELECT postcode, subdistrict, district, province
            FROM postcodes
            ORDER BY id ASC
            OFFSET $1
            LIMIT $2
            "#,
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(rows)
    }
}
