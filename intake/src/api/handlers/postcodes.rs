//! Postcode reference lookup.

use tracing::{debug, instrument};

use crate::{AppState, db::models::postcodes::PostcodeTuple, errors::Result};

/// Read the whole postcode table, one page at a time, preserving table order.
///
/// Paging stops at the first short or empty page. Any failed page read fails the lookup.
#[instrument(skip_all, err)]
pub async fn get_postcode_data(state: &AppState) -> Result<Vec<PostcodeTuple>> {
    let batch_size = i64::from(state.config.postcodes.batch_size);
    let mut rows = Vec::new();
    let mut offset = 0;
    let mut pages = 0;

    loop {
        let page = state.postcodes.fetch_page(offset, batch_size).await?;
        pages += 1;
        let fetched = page.len() as i64;
        rows.extend(page.into_iter().map(PostcodeTuple::from));

        if fetched < batch_size {
            break;
        }
        offset += fetched;
    }

    debug!(rows = rows.len(), pages, "Fetched postcode table");
    Ok(rows)
}
