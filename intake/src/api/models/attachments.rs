//! Receipt attachment descriptors sent inline with a submission.
//!
//! Each attachment is `{name, type, data}` with `data` base64-encoded, optionally as a
//! `data:<mime>;base64,` URL. `receiptFile` may hold a single descriptor or an array of them.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::SurveyId;

const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttachmentPayload {
    /// Original filename, used for its extension
    #[serde(default)]
    pub name: Option<String>,
    /// MIME type, e.g. `image/png`
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
    /// Base64 content
    pub data: String,
}

/// One attachment or several
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ReceiptFiles {
    One(AttachmentPayload),
    Many(Vec<AttachmentPayload>),
}

impl ReceiptFiles {
    pub fn into_vec(self) -> Vec<AttachmentPayload> {
        match self {
            ReceiptFiles::One(file) => vec![file],
            ReceiptFiles::Many(files) => files,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("attachment has no data")]
    Empty,
    #[error("attachment is not valid base64: {0}")]
    InvalidBase64(String),
}

impl AttachmentPayload {
    /// Decode the base64 content, accepting a `data:...;base64,` prefix
    pub fn decode(&self) -> Result<Vec<u8>, AttachmentError> {
        let encoded = self.data.trim();
        let encoded = match encoded.split_once(";base64,") {
            Some((header, body)) if header.starts_with("data:") => body,
            _ => encoded,
        };
        let encoded: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if encoded.is_empty() {
            return Err(AttachmentError::Empty);
        }
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| AttachmentError::InvalidBase64(e.to_string()))
    }

    /// MIME type given explicitly, or carried in a `data:` URL header
    pub fn declared_content_type(&self) -> Option<&str> {
        let explicit = self.content_type.as_deref().map(str::trim).filter(|t| !t.is_empty());
        explicit.or_else(|| {
            self.data
                .trim()
                .strip_prefix("data:")
                .and_then(|rest| rest.split_once(";base64,"))
                .map(|(mime, _)| mime)
                .filter(|mime| !mime.is_empty())
        })
    }

    /// Extension from the filename, else from the MIME subtype (`jpeg` becomes `jpg`), else `jpg`
    pub fn extension(&self) -> String {
        let from_name = self
            .name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.trim())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        let from_mime = || {
            self.declared_content_type()
                .and_then(|mime| mime.split_once('/'))
                .map(|(_, subtype)| subtype.split(['+', ';']).next().unwrap_or(subtype).trim())
                .filter(|subtype| !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()))
        };

        let ext = from_name.or_else(from_mime).unwrap_or(DEFAULT_EXTENSION).to_ascii_lowercase();
        if ext == "jpeg" { DEFAULT_EXTENSION.to_string() } else { ext }
    }

    /// Content type to store the object with
    pub fn storage_content_type(&self, filename: &str) -> String {
        match self.declared_content_type() {
            Some(mime) => mime.to_string(),
            None => mime_guess::from_path(filename).first_or_octet_stream().to_string(),
        }
    }
}

/// Object name for attachment `index` (zero-based) of `total`.
///
/// A lone attachment is `{id}_receipt.{ext}`; with several they are numbered from 1 as
/// `{id}_receipt_{n}.{ext}`.
pub fn receipt_filename(survey_id: SurveyId, index: usize, total: usize, extension: &str) -> String {
    if total <= 1 {
        format!("{survey_id}_receipt.{extension}")
    } else {
        format!("{survey_id}_receipt_{}.{extension}", index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: Option<&str>, content_type: Option<&str>, data: &str) -> AttachmentPayload {
        AttachmentPayload {
            name: name.map(String::from),
            content_type: content_type.map(String::from),
            data: data.to_string(),
        }
    }

    #[test]
    fn accepts_single_descriptor_or_array() {
        let one: ReceiptFiles =
            serde_json::from_value(serde_json::json!({"name": "a.png", "type": "image/png", "data": "AAEC"})).unwrap();
        assert_eq!(one.into_vec().len(), 1);

        let many: ReceiptFiles =
            serde_json::from_value(serde_json::json!([{"data": "AAEC"}, {"name": "b.jpg", "data": "AAEC"}])).unwrap();
        let many = many.into_vec();
        assert_eq!(many.len(), 2);
        assert_eq!(many[0].name, None);
        assert_eq!(many[1].name.as_deref(), Some("b.jpg"));
    }

    #[test]
    fn decodes_plain_and_data_url_base64() {
        assert_eq!(payload(None, None, "AAEC").decode().unwrap(), vec![0, 1, 2]);
        assert_eq!(
            payload(None, None, "data:image/png;base64,AAEC").decode().unwrap(),
            vec![0, 1, 2]
        );
        assert_eq!(payload(None, None, "AA\nEC").decode().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn rejects_empty_and_invalid_data() {
        assert_eq!(payload(None, None, "  ").decode(), Err(AttachmentError::Empty));
        assert_eq!(payload(None, None, "data:image/png;base64,").decode(), Err(AttachmentError::Empty));
        assert!(matches!(
            payload(None, None, "not base64!").decode(),
            Err(AttachmentError::InvalidBase64(_))
        ));
    }

    #[test]
    fn extension_prefers_name_then_mime_then_default() {
        assert_eq!(payload(Some("slip.PNG"), Some("image/jpeg"), "").extension(), "png");
        assert_eq!(payload(Some("slip"), Some("image/jpeg"), "").extension(), "jpg");
        assert_eq!(payload(None, Some("image/webp"), "").extension(), "webp");
        assert_eq!(payload(None, None, "data:image/gif;base64,AAEC").extension(), "gif");
        assert_eq!(payload(None, Some("image/svg+xml"), "").extension(), "svg");
        assert_eq!(payload(None, None, "AAEC").extension(), "jpg");
        assert_eq!(payload(Some("photo.jpeg"), None, "").extension(), "jpg");
    }

    #[test]
    fn content_type_falls_back_to_filename_guess() {
        assert_eq!(payload(None, Some("image/png"), "").storage_content_type("x.jpg"), "image/png");
        assert_eq!(payload(None, None, "").storage_content_type("x.png"), "image/png");
        assert_eq!(payload(None, None, "").storage_content_type("x.unknownext"), "application/octet-stream");
    }

    #[test]
    fn filenames_follow_single_and_multiple_patterns() {
        let id = SurveyId::from_counter(12);
        assert_eq!(receipt_filename(id, 0, 1, "jpg"), "ATG00000012_receipt.jpg");
        assert_eq!(receipt_filename(id, 0, 3, "png"), "ATG00000012_receipt_1.png");
        assert_eq!(receipt_filename(id, 2, 3, "jpg"), "ATG00000012_receipt_3.jpg");
    }
}
