use chrono::Utc;

use tripflow_core::domain::user::{
    Role, PERMISSION_VIEW_ALL_REQUESTS, PERMISSION_VIEW_REPORTS, PERMISSION_WORKFLOW_OVERRIDE,
};

use crate::connection::DbPool;
use crate::repositories::{encode_timestamp, RepositoryError};

struct SeedUser {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    department: &'static str,
    role: Role,
}

const SEED_PERMISSIONS: &[(&str, &str)] = &[
    (PERMISSION_VIEW_ALL_REQUESTS, "View requests submitted by any user"),
    (PERMISSION_WORKFLOW_OVERRIDE, "Act on any workflow stage regardless of role"),
    (PERMISSION_VIEW_REPORTS, "Run request reports"),
];

const SEED_ROLE_PERMISSIONS: &[(Role, &str)] = &[
    (Role::SystemAdmin, PERMISSION_VIEW_ALL_REQUESTS),
    (Role::SystemAdmin, PERMISSION_WORKFLOW_OVERRIDE),
    (Role::SystemAdmin, PERMISSION_VIEW_REPORTS),
    (Role::Hod, PERMISSION_VIEW_ALL_REQUESTS),
    (Role::Hod, PERMISSION_VIEW_REPORTS),
    (Role::TicketingAdmin, PERMISSION_VIEW_ALL_REQUESTS),
    (Role::ClaimsAdmin, PERMISSION_VIEW_ALL_REQUESTS),
    (Role::ClaimsAdmin, PERMISSION_VIEW_REPORTS),
    (Role::VisaAdmin, PERMISSION_VIEW_ALL_REQUESTS),
    (Role::TransportAdmin, PERMISSION_VIEW_ALL_REQUESTS),
    (Role::AccommodationAdmin, PERMISSION_VIEW_ALL_REQUESTS),
];

const SEED_USERS: &[SeedUser] = &[
    SeedUser {
        id: "u-requestor",
        name: "Aina Rahman",
        email: "aina.rahman@tripflow.local",
        department: "Drilling",
        role: Role::Requestor,
    },
    SeedUser {
        id: "u-focal",
        name: "Badrul Hisham",
        email: "badrul.hisham@tripflow.local",
        department: "Drilling",
        role: Role::DepartmentFocal,
    },
    SeedUser {
        id: "u-line-manager",
        name: "Chen Wei Ling",
        email: "chen.weiling@tripflow.local",
        department: "Drilling",
        role: Role::LineManager,
    },
    SeedUser {
        id: "u-hod",
        name: "Devi Narayanan",
        email: "devi.narayanan@tripflow.local",
        department: "Drilling",
        role: Role::Hod,
    },
    SeedUser {
        id: "u-ticketing",
        name: "Eng Soon Huat",
        email: "eng.soonhuat@tripflow.local",
        department: "Travel Desk",
        role: Role::TicketingAdmin,
    },
    SeedUser {
        id: "u-claims",
        name: "Farah Idris",
        email: "farah.idris@tripflow.local",
        department: "Finance",
        role: Role::ClaimsAdmin,
    },
    SeedUser {
        id: "u-visa",
        name: "Gopal Krishnan",
        email: "gopal.krishnan@tripflow.local",
        department: "Travel Desk",
        role: Role::VisaAdmin,
    },
    SeedUser {
        id: "u-transport",
        name: "Hafiz Osman",
        email: "hafiz.osman@tripflow.local",
        department: "General Services",
        role: Role::TransportAdmin,
    },
    SeedUser {
        id: "u-accommodation",
        name: "Irene Tan",
        email: "irene.tan@tripflow.local",
        department: "General Services",
        role: Role::AccommodationAdmin,
    },
    SeedUser {
        id: "u-admin",
        name: "Jamal Yusof",
        email: "jamal.yusof@tripflow.local",
        department: "IT",
        role: Role::SystemAdmin,
    },
];

/// Demo users, roles and permissions for local development. Re-running is
/// safe: every insert is keyed and upserts.
pub struct DemoDirectory;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeededUser {
    pub id: &'static str,
    pub name: &'static str,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub permissions_seeded: usize,
    pub role_grants_seeded: usize,
    pub users_seeded: Vec<SeededUser>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl DemoDirectory {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        let now = encode_timestamp(Utc::now());

        for &(name, description) in SEED_PERMISSIONS {
            sqlx::query(
                "INSERT INTO permission (name, description) VALUES (?, ?)
                 ON CONFLICT(name) DO UPDATE SET description = excluded.description",
            )
            .bind(name)
            .bind(description)
            .execute(&mut *tx)
            .await?;
        }

        for &(role, permission) in SEED_ROLE_PERMISSIONS {
            sqlx::query(
                "INSERT OR IGNORE INTO role_permission (role, permission_name) VALUES (?, ?)",
            )
            .bind(role.as_str())
            .bind(permission)
            .execute(&mut *tx)
            .await?;
        }

        for user in SEED_USERS {
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
            .bind(user.id)
            .bind(user.name)
            .bind(user.email)
            .bind(user.department)
            .bind(user.role.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(SeedResult {
            permissions_seeded: SEED_PERMISSIONS.len(),
            role_grants_seeded: SEED_ROLE_PERMISSIONS.len(),
            users_seeded: SEED_USERS
                .iter()
                .map(|user| SeededUser { id: user.id, name: user.name, role: user.role })
                .collect(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for &(name, _) in SEED_PERMISSIONS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM permission WHERE name = ?1)")
                    .bind(name)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("permission:{name}"), exists == 1));
        }

        for &(role, permission) in SEED_ROLE_PERMISSIONS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM role_permission WHERE role = ?1 AND permission_name = ?2)",
            )
            .bind(role.as_str())
            .bind(permission)
            .fetch_one(pool)
            .await?;
            checks.push((format!("grant:{role}:{permission}"), exists == 1));
        }

        for user in SEED_USERS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM app_user WHERE id = ?1 AND role = ?2 AND active = 1)",
            )
            .bind(user.id)
            .bind(user.role.as_str())
            .fetch_one(pool)
            .await?;
            checks.push((format!("user:{}", user.id), exists == 1));
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tripflow_core::domain::user::Role;

    use super::{DemoDirectory, SEED_USERS};
    use crate::repositories::{SqlUserRepository, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn seed_covers_every_role_and_verifies() {
        let pool = setup().await;

        let result = DemoDirectory::load(&pool).await.expect("seed");
        let seeded_roles: BTreeSet<Role> = result.users_seeded.iter().map(|user| user.role).collect();
        assert_eq!(seeded_roles.len(), Role::ALL.len(), "one demo user per role");

        let verification = DemoDirectory::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);
    }

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let pool = setup().await;
        DemoDirectory::load(&pool).await.expect("first seed");
        DemoDirectory::load(&pool).await.expect("second seed");

        let users = SqlUserRepository::new(pool).list().await.expect("list users");
        assert_eq!(users.len(), SEED_USERS.len());

        let admin = users.iter().find(|user| user.role == Role::SystemAdmin).expect("admin");
        assert!(admin.can_override_workflow());
        assert!(admin.can_view_all_requests());
    }

    #[tokio::test]
    async fn verify_reports_missing_data_on_empty_database() {
        let pool = setup().await;
        let verification = DemoDirectory::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
    }
}
