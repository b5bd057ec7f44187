use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use tripflow_core::domain::document::VisaDocument;
use tripflow_core::domain::request::{RequestId, RequestKind, ServiceRequest};
use tripflow_core::domain::step::ApprovalStep;
use tripflow_core::domain::user::User;

pub mod document;
pub mod request;
pub mod user;

pub use document::SqlVisaDocumentRepository;
pub use request::SqlRequestRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("request `{0}` was not found")]
    NotFound(String),
    /// The stored status no longer matches what the caller read.
    #[error("request `{id}` changed concurrently (expected status `{expected}`, found `{actual}`)")]
    Conflict { id: String, expected: String, actual: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestFilter {
    pub kind: Option<RequestKind>,
    /// Exact stored status values; empty means any status.
    pub statuses: Vec<String>,
    pub requestor_id: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self {
            kind: None,
            statuses: Vec::new(),
            requestor_id: None,
            created_from: None,
            created_to: None,
            limit: 20,
            offset: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusCount {
    pub kind: RequestKind,
    pub status: String,
    pub count: i64,
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Inserts the request together with its `Submitted` step.
    async fn insert_submission(
        &self,
        request: &ServiceRequest,
        step: &ApprovalStep,
    ) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        kind: RequestKind,
        id: &RequestId,
    ) -> Result<Option<ServiceRequest>, RepositoryError>;

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, RepositoryError>;

    async fn count(&self, filter: &RequestFilter) -> Result<i64, RepositoryError>;

    async fn status_counts(
        &self,
        requestor_id: Option<&str>,
    ) -> Result<Vec<StatusCount>, RepositoryError>;

    /// Moves the request from `expected_status` to `step.request_status` and
    /// appends `step`, atomically.
    async fn apply_transition(
        &self,
        id: &RequestId,
        expected_status: &str,
        step: &ApprovalStep,
    ) -> Result<(), RepositoryError>;

    async fn update_payload(
        &self,
        request: &ServiceRequest,
        expected_status: &str,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, id: &RequestId, expected_status: &str) -> Result<(), RepositoryError>;

    async fn list_steps(&self, id: &RequestId) -> Result<Vec<ApprovalStep>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Active users only, with permissions resolved through their role.
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
    async fn save(&self, user: &User) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VisaDocumentRepository: Send + Sync {
    /// Inserts or replaces the document of the same type; returns the stored row.
    async fn upsert(&self, document: &VisaDocument) -> Result<VisaDocument, RepositoryError>;
    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<VisaDocument>, RepositoryError>;
}

/// Fixed-width UTC timestamps so lexical order matches chronological order.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

pub(crate) fn decode_column<'r, T>(
    row: &'r sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    use sqlx::Row;
    row.try_get(column).map_err(|error| RepositoryError::Decode(error.to_string()))
}
