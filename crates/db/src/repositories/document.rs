use sqlx::sqlite::SqliteRow;

use tripflow_core::domain::document::VisaDocument;
use tripflow_core::domain::request::RequestId;

use super::{
    decode_column, decode_timestamp, encode_timestamp, RepositoryError, VisaDocumentRepository,
};
use crate::DbPool;

const DOCUMENT_COLUMNS: &str = "id, request_id, document_type, file_name, stored_path, content_type,
     size_bytes, uploaded_by, uploaded_at";

pub struct SqlVisaDocumentRepository {
    pool: DbPool,
}

impl SqlVisaDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &SqliteRow) -> Result<VisaDocument, RepositoryError> {
    let size_bytes: i64 = decode_column(row, "size_bytes")?;
    let uploaded_at: String = decode_column(row, "uploaded_at")?;

    Ok(VisaDocument {
        id: decode_column(row, "id")?,
        request_id: RequestId(decode_column(row, "request_id")?),
        document_type: decode_column(row, "document_type")?,
        file_name: decode_column(row, "file_name")?,
        stored_path: decode_column(row, "stored_path")?,
        content_type: decode_column(row, "content_type")?,
        size_bytes: u64::try_from(size_bytes)
            .map_err(|_| RepositoryError::Decode(format!("negative size_bytes {size_bytes}")))?,
        uploaded_by: decode_column(row, "uploaded_by")?,
        uploaded_at: decode_timestamp("uploaded_at", &uploaded_at)?,
    })
}

#[async_trait::async_trait]
impl VisaDocumentRepository for SqlVisaDocumentRepository {
    async fn upsert(&self, document: &VisaDocument) -> Result<VisaDocument, RepositoryError> {
        let size_bytes = i64::try_from(document.size_bytes)
            .map_err(|_| RepositoryError::Decode("size_bytes overflows i64".to_string()))?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO visa_document (id, request_id, document_type, file_name, stored_path,
                                        content_type, size_bytes, uploaded_by, uploaded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(request_id, document_type) DO UPDATE SET
                 file_name = excluded.file_name,
                 stored_path = excluded.stored_path,
                 content_type = excluded.content_type,
                 size_bytes = excluded.size_bytes,
                 uploaded_by = excluded.uploaded_by,
                 uploaded_at = excluded.uploaded_at",
        )
        .bind(&document.id)
        .bind(&document.request_id.0)
        .bind(&document.document_type)
        .bind(&document.file_name)
        .bind(&document.stored_path)
        .bind(&document.content_type)
        .bind(size_bytes)
        .bind(&document.uploaded_by)
        .bind(encode_timestamp(document.uploaded_at))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM visa_document WHERE request_id = ? AND document_type = ?"
        ))
        .bind(&document.request_id.0)
        .bind(&document.document_type)
        .fetch_one(&mut *tx)
        .await?;
        let stored = row_to_document(&row)?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<VisaDocument>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM visa_document WHERE request_id = ? ORDER BY document_type"
        ))
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }
}
