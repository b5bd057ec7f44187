use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use tripflow_core::domain::user::{Role, User};

use super::{decode_column, encode_timestamp, RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn permissions_for(&self, role: Role) -> Result<BTreeSet<String>, RepositoryError> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT permission_name FROM role_permission WHERE role = ? ORDER BY permission_name",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(names.into_iter().collect())
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    let role_str: String = decode_column(row, "role")?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown role `{role_str}`")))?;

    Ok(User {
        id: decode_column(row, "id")?,
        name: decode_column(row, "name")?,
        email: decode_column(row, "email")?,
        department: decode_column(row, "department")?,
        role,
        permissions: BTreeSet::new(),
    })
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, department, role FROM app_user WHERE id = ? AND active = 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut user = row_to_user(&row)?;
        user.permissions = self.permissions_for(user.role).await?;
        Ok(Some(user))
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, email, department, role FROM app_user WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut user = row_to_user(row)?;
            user.permissions = self.permissions_for(user.role).await?;
            users.push(user);
        }
        Ok(users)
    }

    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user (id, name, email, department, role, active, created_at)
             VALUES (?, ?, ?, ?, ?, 1, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 department = excluded.department,
                 role = excluded.role,
                 active = 1",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.department)
        .bind(user.role.as_str())
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tripflow_core::domain::user::{Role, User, PERMISSION_WORKFLOW_OVERRIDE};

    use super::SqlUserRepository;
    use crate::repositories::UserRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            name: format!("User {id}"),
            email: format!("{id}@example.com"),
            department: "Finance".to_string(),
            role,
            permissions: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn permissions_are_resolved_through_the_role() {
        let pool = setup().await;
        sqlx::query("INSERT INTO permission (name, description) VALUES (?, 'override')")
            .bind(PERMISSION_WORKFLOW_OVERRIDE)
            .execute(&pool)
            .await
            .expect("permission");
        sqlx::query("INSERT INTO role_permission (role, permission_name) VALUES ('system_admin', ?)")
            .bind(PERMISSION_WORKFLOW_OVERRIDE)
            .execute(&pool)
            .await
            .expect("role permission");

        let repo = SqlUserRepository::new(pool);
        repo.save(&user("admin", Role::SystemAdmin)).await.expect("save admin");
        repo.save(&user("emp", Role::Requestor)).await.expect("save requestor");

        let admin = repo.find_by_id("admin").await.expect("find").expect("admin exists");
        assert!(admin.can_override_workflow());

        let requestor = repo.find_by_id("emp").await.expect("find").expect("requestor exists");
        assert!(requestor.permissions.is_empty());

        assert_eq!(repo.list().await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn unknown_and_inactive_users_are_not_found() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool.clone());
        repo.save(&user("gone", Role::LineManager)).await.expect("save");
        sqlx::query("UPDATE app_user SET active = 0 WHERE id = 'gone'")
            .execute(&pool)
            .await
            .expect("deactivate");

        assert!(repo.find_by_id("gone").await.expect("find").is_none());
        assert!(repo.find_by_id("nobody").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn save_updates_existing_user() {
        let repo = SqlUserRepository::new(setup().await);
        repo.save(&user("u-1", Role::Requestor)).await.expect("save");
        repo.save(&user("u-1", Role::LineManager)).await.expect("update");

        let found = repo.find_by_id("u-1").await.expect("find").expect("exists");
        assert_eq!(found.role, Role::LineManager);
    }
}
