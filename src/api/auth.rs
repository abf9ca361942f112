use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use super::extract::ApiJson;
use super::response::ApiResponse;
use super::session::{cleared_cookie, issue_token, session_cookie, verify_token, SESSION_COOKIE};
use super::validation::{normalize_email, validate_registration};
use crate::db::{
    AuthPayload, Lead, LoginRequest, NewUser, RegisterRequest, Role, User, UserResponse,
};
use crate::AppState;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Session token from `Authorization: Bearer` or the session cookie
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve a token to the user it was issued for
pub async fn get_current_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = verify_token(token, &state.config.auth.jwt_secret)
        .ok_or_else(|| ApiError::unauthorized("Sitzung ungültig oder abgelaufen"))?;

    User::find_by_id(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Benutzer existiert nicht mehr"))
}

/// The authenticated caller. The role is always read from the database, so a
/// role change takes effect without a new login.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn role(&self) -> Role {
        self.0.role_enum()
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Admin or vertrieb
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.role().is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Keine Berechtigung für diese Aktion"))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role().can_manage_users() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Nur Administratoren dürfen diese Aktion ausführen"))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Bitte melden Sie sich an"))?;
        get_current_user(state, &token).await.map(AuthUser)
    }
}

fn issue_session(
    state: &AppState,
    jar: CookieJar,
    user: User,
) -> Result<(CookieJar, AuthPayload), ApiError> {
    let lifetime_ms = state.config.token_lifetime_ms();
    let token = issue_token(&user, &state.config.auth.jwt_secret, lifetime_ms).map_err(|e| {
        tracing::error!(error = %e, "Failed to sign session token");
        ApiError::internal("Anmeldung fehlgeschlagen")
    })?;

    let jar = jar.add(session_cookie(
        token.clone(),
        lifetime_ms,
        state.config.server.production,
    ));

    Ok((
        jar,
        AuthPayload {
            token,
            user: UserResponse::from(user),
        },
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<AuthPayload>), ApiError> {
    let email = normalize_email(&request.email);
    let user = User::find_by_email(&state.db, &email).await?;

    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => {
            warn!(email = %email, "Failed login attempt");
            return Err(ApiError::unauthorized("E-Mail oder Passwort ist falsch"));
        }
    };

    User::touch_last_login(&state.db, &user.id).await?;
    let user = User::find_by_id(&state.db, &user.id).await?.unwrap_or(user);

    info!(user_id = %user.id, role = %user.role, "User logged in");

    let (jar, payload) = issue_session(&state, jar, user)?;
    Ok((jar, ApiResponse::ok(payload).with_message("Erfolgreich angemeldet")))
}

/// POST /api/auth/register
///
/// Creates a customer account and links any existing leads submitted with
/// the same e-mail address.
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(axum::http::StatusCode, CookieJar, ApiResponse<AuthPayload>), ApiError> {
    validate_registration(&request)?;

    let email = normalize_email(&request.email);
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::conflict(
            "Diese E-Mail-Adresse ist bereits registriert.",
        ));
    }

    let password_hash = hash_password(&request.password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Registrierung fehlgeschlagen")
    })?;

    let user = User::insert(
        &state.db,
        &NewUser {
            name: request.name.trim().to_string(),
            email: email.clone(),
            password_hash,
            role: Role::Kunde,
            salutation: request.salutation.clone(),
            company: request.company.clone(),
            company_url: request.company_url.clone(),
            phone: request.phone.clone(),
        },
    )
    .await?;

    let linked = Lead::link_customer(&state.db, &email, &user.id).await?;
    info!(user_id = %user.id, linked_leads = linked, "User registered");

    let (jar, payload) = issue_session(&state, jar, user)?;
    Ok((
        axum::http::StatusCode::CREATED,
        jar,
        ApiResponse::ok(payload).with_message("Registrierung erfolgreich"),
    ))
}

/// GET /api/auth/me
pub async fn me(user: AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(UserResponse::from(user.0))
}

/// POST /api/auth/logout
///
/// Tokens are stateless; logging out only drops the cookie.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, ApiResponse<()>) {
    let jar = jar.add(cleared_cookie(state.config.server.production));
    (jar, ApiResponse::message("Erfolgreich abgemeldet"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("sicher123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("sicher123", &hash));
        assert!(!verify_password("falsch123", &hash));
        assert!(!verify_password("sicher123", "not-a-hash"));
    }

    #[test]
    fn test_extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert("cookie", HeaderValue::from_static("token=fromcookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));

        headers.remove(AUTHORIZATION);
        assert_eq!(extract_token(&headers).as_deref(), Some("fromcookie"));

        headers.insert("cookie", HeaderValue::from_static("token="));
        assert_eq!(extract_token(&headers), None);
    }
}
