//! User accounts, roles and auth request/response types.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Account roles. Staff roles see every lead; customer roles only their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access including user management
    Admin,
    /// Sales staff: works the lead pipeline
    Vertrieb,
    /// Customer account
    Kunde,
    /// Prospect account with the same view as a customer
    Lead,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Vertrieb, Role::Kunde, Role::Lead];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Vertrieb => "vertrieb",
            Role::Kunde => "kunde",
            Role::Lead => "lead",
        }
    }

    /// Staff may read all leads and mutate them
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Vertrieb)
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Map any stored role value onto a valid role.
    ///
    /// Valid roles are kept as they are, the legacy `user` role becomes
    /// `kunde` and anything else, case variants included, becomes `lead`.
    pub fn repair(raw: &str) -> Role {
        match raw.parse() {
            Ok(role) => role,
            Err(_) if raw == "user" => Role::Kunde,
            Err(_) => Role::Lead,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "vertrieb" => Ok(Role::Vertrieb),
            "kunde" => Ok(Role::Kunde),
            "lead" => Ok(Role::Lead),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub salutation: Option<String>,
    pub company: Option<String>,
    pub company_url: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// The effective role. Out-of-enum values get the least privileged role.
    pub fn role_enum(&self) -> Role {
        self.role.parse().unwrap_or_else(|_| {
            tracing::warn!(user_id = %self.id, role = %self.role, "User has an invalid role, treating as lead");
            Role::Lead
        })
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn insert(pool: &SqlitePool, new: &NewUser) -> Result<User, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, salutation, company, company_url, phone)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role.as_str())
        .bind(&new.salutation)
        .bind(&new.company)
        .bind(&new.company_url)
        .bind(&new.phone)
        .execute(pool)
        .await?;

        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await
    }

    pub async fn update_profile(
        pool: &SqlitePool,
        id: &str,
        req: &UpdateProfileRequest,
    ) -> Result<User, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users SET
                name = COALESCE(?, name),
                salutation = COALESCE(?, salutation),
                company = COALESCE(?, company),
                company_url = COALESCE(?, company_url),
                phone = COALESCE(?, phone),
                department = COALESCE(?, department),
                position = COALESCE(?, position),
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(&req.name)
        .bind(&req.salutation)
        .bind(&req.company)
        .bind(&req.company_url)
        .bind(&req.phone)
        .bind(&req.department)
        .bind(&req.position)
        .bind(id)
        .execute(pool)
        .await?;

        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    pub async fn set_password_hash(
        pool: &SqlitePool,
        id: &str,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = datetime('now') WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_role(pool: &SqlitePool, id: &str, role: Role) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("UPDATE users SET role = ?, updated_at = datetime('now') WHERE id = ?")
                .bind(role.as_str())
                .bind(id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    pub async fn touch_last_login(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// Values for a user row about to be inserted
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub salutation: Option<String>,
    pub company: Option<String>,
    pub company_url: Option<String>,
    pub phone: Option<String>,
}

/// User as returned to clients. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salutation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            salutation: user.salutation,
            company: user.company,
            company_url: user.company_url,
            phone: user.phone,
            department: user.department,
            position: user.position,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub salutation: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub company_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Token plus user, returned by login and registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub salutation: Option<String>,
    pub company: Option<String>,
    pub company_url: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}
