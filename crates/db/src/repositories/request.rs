use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite};

use tripflow_core::domain::payload::RequestPayload;
use tripflow_core::domain::request::{RequestId, RequestKind, Requestor, ServiceRequest};
use tripflow_core::domain::step::{ApprovalStep, StepOutcome};
use tripflow_core::domain::user::Role;

use super::{
    decode_column, decode_timestamp, encode_timestamp, RepositoryError, RequestFilter,
    RequestRepository, StatusCount,
};
use crate::DbPool;

const REQUEST_COLUMNS: &str = "id, kind, requestor_id, requestor_name, requestor_email, department,
     status, payload_json, created_at, updated_at";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_kind(value: &str) -> Result<RequestKind, RepositoryError> {
    RequestKind::parse(value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request kind `{value}`")))
}

fn row_to_request(row: &SqliteRow) -> Result<ServiceRequest, RepositoryError> {
    let kind = parse_kind(&decode_column::<String>(row, "kind")?)?;
    let payload_json: String = decode_column(row, "payload_json")?;
    let payload_value: serde_json::Value = serde_json::from_str(&payload_json)
        .map_err(|error| RepositoryError::Decode(format!("payload_json: {error}")))?;
    let payload = RequestPayload::decode(kind, payload_value)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;
    let created_at: String = decode_column(row, "created_at")?;
    let updated_at: String = decode_column(row, "updated_at")?;

    Ok(ServiceRequest {
        id: RequestId(decode_column(row, "id")?),
        kind,
        requestor: Requestor {
            id: decode_column(row, "requestor_id")?,
            name: decode_column(row, "requestor_name")?,
            email: decode_column(row, "requestor_email")?,
            department: decode_column(row, "department")?,
        },
        status: decode_column(row, "status")?,
        payload,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_step(row: &SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let kind = parse_kind(&decode_column::<String>(row, "request_kind")?)?;
    let role_str: String = decode_column(row, "role")?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_str}`")))?;
    let outcome_str: String = decode_column(row, "status")?;
    let outcome = StepOutcome::parse(&outcome_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown step status `{outcome_str}`")))?;
    let step_date: String = decode_column(row, "step_date")?;

    Ok(ApprovalStep {
        id: decode_column(row, "id")?,
        request_id: RequestId(decode_column(row, "request_id")?),
        kind,
        role,
        actor_id: decode_column(row, "actor_id")?,
        actor_name: decode_column(row, "actor_name")?,
        outcome,
        request_status: decode_column(row, "request_status")?,
        comments: decode_column(row, "comments")?,
        step_date: decode_timestamp("step_date", &step_date)?,
    })
}

fn push_filter<'a>(builder: &mut QueryBuilder<'a, Sqlite>, filter: &'a RequestFilter) {
    builder.push(" WHERE 1=1");
    if let Some(kind) = filter.kind {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    if !filter.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in &filter.statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
    if let Some(requestor_id) = &filter.requestor_id {
        builder.push(" AND requestor_id = ").push_bind(requestor_id.as_str());
    }
    if let Some(from) = filter.created_from {
        builder.push(" AND created_at >= ").push_bind(encode_timestamp(from));
    }
    if let Some(to) = filter.created_to {
        builder.push(" AND created_at <= ").push_bind(encode_timestamp(to));
    }
}

async fn insert_step<'e, E>(executor: E, step: &ApprovalStep) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO approval_step (id, request_id, request_kind, role, actor_id, actor_name,
                                    status, request_status, comments, step_date)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&step.id)
    .bind(&step.request_id.0)
    .bind(step.kind.as_str())
    .bind(step.role.as_str())
    .bind(&step.actor_id)
    .bind(&step.actor_name)
    .bind(step.outcome.as_str())
    .bind(&step.request_status)
    .bind(&step.comments)
    .bind(encode_timestamp(step.step_date))
    .execute(executor)
    .await?;
    Ok(())
}

/// Explains a compare-and-set miss: the row is gone or its status moved on.
async fn cas_failure<'e, E>(
    executor: E,
    id: &RequestId,
    expected_status: &str,
) -> Result<RepositoryError, RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM service_request WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(executor)
            .await?;

    Ok(match current {
        None => RepositoryError::NotFound(id.0.clone()),
        Some(actual) => RepositoryError::Conflict {
            id: id.0.clone(),
            expected: expected_status.to_string(),
            actual,
        },
    })
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn insert_submission(
        &self,
        request: &ServiceRequest,
        step: &ApprovalStep,
    ) -> Result<(), RepositoryError> {
        let payload_json = serde_json::to_string(&request.payload)
            .map_err(|error| RepositoryError::Decode(format!("payload_json: {error}")))?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO service_request (id, kind, requestor_id, requestor_name, requestor_email,
                                          department, status, payload_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(request.kind.as_str())
        .bind(&request.requestor.id)
        .bind(&request.requestor.name)
        .bind(&request.requestor.email)
        .bind(&request.requestor.department)
        .bind(&request.status)
        .bind(&payload_json)
        .bind(encode_timestamp(request.created_at))
        .bind(encode_timestamp(request.updated_at))
        .execute(&mut *tx)
        .await?;

        insert_step(&mut *tx, step).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        kind: RequestKind,
        id: &RequestId,
    ) -> Result<Option<ServiceRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM service_request WHERE id = ? AND kind = ?"
        ))
        .bind(&id.0)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_request).transpose()
    }

    async fn list(&self, filter: &RequestFilter) -> Result<Vec<ServiceRequest>, RepositoryError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {REQUEST_COLUMNS} FROM service_request"));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_request).collect()
    }

    async fn count(&self, filter: &RequestFilter) -> Result<i64, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM service_request");
        push_filter(&mut builder, filter);

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn status_counts(
        &self,
        requestor_id: Option<&str>,
    ) -> Result<Vec<StatusCount>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT kind, status, COUNT(*) AS count FROM service_request WHERE 1=1",
        );
        if let Some(requestor_id) = requestor_id {
            builder.push(" AND requestor_id = ").push_bind(requestor_id);
        }
        builder.push(" GROUP BY kind, status ORDER BY kind, status");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(StatusCount {
                    kind: parse_kind(&decode_column::<String>(row, "kind")?)?,
                    status: decode_column(row, "status")?,
                    count: decode_column(row, "count")?,
                })
            })
            .collect()
    }

    async fn apply_transition(
        &self,
        id: &RequestId,
        expected_status: &str,
        step: &ApprovalStep,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE service_request SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(&step.request_status)
        .bind(encode_timestamp(step.step_date))
        .bind(&id.0)
        .bind(expected_status)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let error = cas_failure(&mut *tx, id, expected_status).await?;
            tx.rollback().await?;
            return Err(error);
        }

        insert_step(&mut *tx, step).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn update_payload(
        &self,
        request: &ServiceRequest,
        expected_status: &str,
    ) -> Result<(), RepositoryError> {
        let payload_json = serde_json::to_string(&request.payload)
            .map_err(|error| RepositoryError::Decode(format!("payload_json: {error}")))?;
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE service_request SET payload_json = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(&payload_json)
        .bind(encode_timestamp(request.updated_at))
        .bind(&request.id.0)
        .bind(expected_status)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let error = cas_failure(&mut *tx, &request.id, expected_status).await?;
            tx.rollback().await?;
            return Err(error);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &RequestId, expected_status: &str) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM service_request WHERE id = ? AND status = ?")
            .bind(&id.0)
            .bind(expected_status)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            let error = cas_failure(&mut *tx, id, expected_status).await?;
            tx.rollback().await?;
            return Err(error);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_steps(&self, id: &RequestId) -> Result<Vec<ApprovalStep>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, request_kind, role, actor_id, actor_name, status,
                    request_status, comments, step_date
             FROM approval_step
             WHERE request_id = ?
             ORDER BY step_date ASC, rowid ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_step).collect()
    }
}
