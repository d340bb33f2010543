//! Database models for postcode reference data.

use serde::{Deserialize, Serialize};

/// One row of the `postcodes` reference table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostcodeRecord {
    pub postcode: String,
    pub subdistrict: String,
    pub district: String,
    pub province: String,
}

/// Wire shape of a postcode row: `(postcode, subdistrict, district, province)`
pub type PostcodeTuple = (String, String, String, String);

impl From<PostcodeRecord> for PostcodeTuple {
    fn from(record: PostcodeRecord) -> Self {
        (record.postcode, record.subdistrict, record.district, record.province)
    }
}
