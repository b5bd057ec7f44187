use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::RequestId;
use crate::errors::FieldError;

/// Supporting document attached to a visa application. One row per
/// `(request_id, document_type)`; a re-upload replaces the previous file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaDocument {
    pub id: String,
    pub request_id: RequestId,
    pub document_type: String,
    pub file_name: String,
    pub stored_path: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

impl VisaDocument {
    pub fn new_id() -> String {
        format!("DOC-{}", Uuid::new_v4().simple())
    }
}

/// Lowercases and checks a client supplied document type such as `passport`.
pub fn normalize_document_type(value: &str) -> Result<String, FieldError> {
    let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    if normalized.is_empty() {
        return Err(FieldError::new("document_type", "is required"));
    }
    if normalized.len() > 64 {
        return Err(FieldError::new("document_type", "must be at most 64 characters"));
    }
    if !normalized.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(FieldError::new(
            "document_type",
            "may only contain letters, digits, spaces, hyphens or underscores",
        ));
    }
    Ok(normalized)
}

/// Strips any directory components and unsafe characters from an uploaded
/// file name so it can be joined onto the upload directory.
pub fn sanitize_file_name(value: &str) -> String {
    let base = value.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') { ch } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_document_type, sanitize_file_name};

    #[test]
    fn document_type_is_normalized() {
        assert_eq!(normalize_document_type(" Passport Copy ").expect("valid"), "passport_copy");
        assert_eq!(normalize_document_type("bank-statement").expect("valid"), "bank_statement");
        assert!(normalize_document_type("   ").is_err());
        assert!(normalize_document_type("photo/../../etc").is_err());
    }

    #[test]
    fn file_names_cannot_escape_the_upload_directory() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\my passport.pdf"), "my_passport.pdf");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(".hidden.png"), "hidden.png");
    }
}
