//! Bootstrap admin account and role maintenance.

use anyhow::{Context, Result};
use rand::{distr::Alphanumeric, Rng};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::models::{NewUser, Role, User};
use crate::api::auth::hash_password;
use crate::api::validation::normalize_email;
use crate::config::AuthConfig;

/// Make sure the deployment has its bootstrap admin.
///
/// Does nothing when any admin exists. Otherwise the configured admin e-mail
/// is promoted if that account exists, or created with the configured
/// password (a random one is generated and logged once if none is set).
pub async fn ensure_admin_user(pool: &SqlitePool, auth: &AuthConfig) -> Result<()> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(pool)
        .await?;
    if admins > 0 {
        return Ok(());
    }

    let email = normalize_email(&auth.admin_email);

    if let Some(existing) = User::find_by_email(pool, &email).await? {
        User::set_role(pool, &existing.id, Role::Admin).await?;
        warn!(email = %existing.email, previous_role = %existing.role, "Promoted existing account to bootstrap admin");
        return Ok(());
    }

    let (password, generated) = match &auth.admin_password {
        Some(password) => (password.clone(), false),
        None => (
            rand::rng()
                .sample_iter(&Alphanumeric)
                .take(20)
                .map(char::from)
                .collect::<String>(),
            true,
        ),
    };

    let password_hash = hash_password(&password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {}", e))?;

    User::insert(
        pool,
        &NewUser {
            name: auth.admin_name.clone(),
            email: email.clone(),
            password_hash,
            role: Role::Admin,
            salutation: None,
            company: None,
            company_url: None,
            phone: None,
        },
    )
    .await
    .context("Failed to create bootstrap admin")?;

    if generated {
        warn!(
            email = %email,
            password = %password,
            "Created bootstrap admin with a generated password; change it after the first login"
        );
    } else {
        info!(email = %email, "Created bootstrap admin");
    }

    Ok(())
}

/// One account whose stored role is outside the valid set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRepair {
    pub user_id: String,
    pub email: String,
    pub from: String,
    pub to: Role,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoleRepairReport {
    pub repairs: Vec<RoleRepair>,
    /// False for a dry run
    pub applied: bool,
}

/// Find users with out-of-enum roles and, when `execute` is set, rewrite
/// them: `user` becomes `kunde`, anything else `lead`.
pub async fn repair_user_roles(pool: &SqlitePool, execute: bool) -> Result<RoleRepairReport> {
    let rows: Vec<(String, String, String)> =
        sqlx::query_as("SELECT id, email, role FROM users ORDER BY email")
            .fetch_all(pool)
            .await?;

    let repairs: Vec<RoleRepair> = rows
        .into_iter()
        .filter(|(_, _, role)| role.parse::<Role>().is_err())
        .map(|(user_id, email, from)| RoleRepair {
            to: Role::repair(&from),
            user_id,
            email,
            from,
        })
        .collect();

    if execute {
        for repair in &repairs {
            User::set_role(pool, &repair.user_id, repair.to).await?;
            info!(
                email = %repair.email,
                from = %repair.from,
                to = %repair.to,
                "Repaired user role"
            );
        }
    }

    Ok(RoleRepairReport {
        repairs,
        applied: execute,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    async fn insert_raw(pool: &SqlitePool, email: &str, role: &str) {
        sqlx::query("INSERT INTO users (id, name, email, password_hash, role) VALUES (?, ?, ?, 'x', ?)")
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(email)
            .bind(email)
            .bind(role)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn invalid_role_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role NOT IN ('admin', 'vertrieb', 'kunde', 'lead')",
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_repair_user_roles() {
        let pool = init_memory().await.unwrap();
        insert_raw(&pool, "a@example.de", "admin").await;
        insert_raw(&pool, "b@example.de", "user").await;
        insert_raw(&pool, "c@example.de", "manager").await;
        insert_raw(&pool, "d@example.de", "kunde").await;

        let dry = repair_user_roles(&pool, false).await.unwrap();
        assert!(!dry.applied);
        assert_eq!(dry.repairs.len(), 2);
        assert_eq!(invalid_role_count(&pool).await, 2);

        let report = repair_user_roles(&pool, true).await.unwrap();
        assert!(report.applied);
        assert_eq!(report.repairs[0].email, "b@example.de");
        assert_eq!(report.repairs[0].to, Role::Kunde);
        assert_eq!(report.repairs[1].email, "c@example.de");
        assert_eq!(report.repairs[1].to, Role::Lead);
        assert_eq!(invalid_role_count(&pool).await, 0);

        let admin = User::find_by_email(&pool, "a@example.de").await.unwrap().unwrap();
        assert_eq!(admin.role, "admin");

        let again = repair_user_roles(&pool, true).await.unwrap();
        assert!(again.repairs.is_empty());
    }

    #[tokio::test]
    async fn test_repair_never_grants_staff_roles() {
        let pool = init_memory().await.unwrap();
        insert_raw(&pool, "a@example.de", "ADMIN").await;
        insert_raw(&pool, "b@example.de", "USER").await;
        insert_raw(&pool, "c@example.de", " Vertrieb ").await;

        let report = repair_user_roles(&pool, true).await.unwrap();
        assert_eq!(report.repairs.len(), 3);
        assert!(report.repairs.iter().all(|r| r.to == Role::Lead));

        for email in ["a@example.de", "b@example.de", "c@example.de"] {
            let user = User::find_by_email(&pool, email).await.unwrap().unwrap();
            assert_eq!(user.role, "lead");
        }
    }

    #[tokio::test]
    async fn test_ensure_admin_user_creates_once() {
        let pool = init_memory().await.unwrap();
        let auth = AuthConfig {
            admin_password: Some("Bootstrap-Passw0rd".to_string()),
            ..AuthConfig::default()
        };

        ensure_admin_user(&pool, &auth).await.unwrap();
        ensure_admin_user(&pool, &auth).await.unwrap();

        let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(admins, 1);

        let admin = User::find_by_email(&pool, &auth.admin_email).await.unwrap().unwrap();
        assert!(crate::api::auth::verify_password("Bootstrap-Passw0rd", &admin.password_hash));
    }

    #[tokio::test]
    async fn test_ensure_admin_user_promotes_existing_account() {
        let pool = init_memory().await.unwrap();
        let auth = AuthConfig::default();
        insert_raw(&pool, &auth.admin_email, "kunde").await;

        ensure_admin_user(&pool, &auth).await.unwrap();

        let admin = User::find_by_email(&pool, &auth.admin_email).await.unwrap().unwrap();
        assert_eq!(admin.role_enum(), Role::Admin);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_email_is_normalized() {
        let pool = init_memory().await.unwrap();
        let auth = AuthConfig {
            admin_email: " Admin@Lead.Online ".to_string(),
            admin_password: Some("Bootstrap-Passw0rd".to_string()),
            ..AuthConfig::default()
        };

        ensure_admin_user(&pool, &auth).await.unwrap();

        let admin = User::find_by_email(&pool, &normalize_email("ADMIN@lead.online"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.email, "admin@lead.online");
        assert_eq!(admin.role_enum(), Role::Admin);
    }
}
