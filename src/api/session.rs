//! Signed session tokens and the session cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::User;

pub const SESSION_COOKIE: &str = "token";

const HOUR_MS: u64 = 60 * 60 * 1000;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Parse a token lifetime such as `"7d"`, `"12h"` or `"30"` (days) into
/// milliseconds.
pub fn parse_duration_ms(value: &str) -> Option<u64> {
    let value = value.trim();
    let (number, unit_ms) = if let Some(days) = value.strip_suffix('d') {
        (days, DAY_MS)
    } else if let Some(hours) = value.strip_suffix('h') {
        (hours, HOUR_MS)
    } else {
        (value, DAY_MS)
    };

    let number: u64 = number.trim().parse().ok()?;
    if number == 0 {
        return None;
    }
    number.checked_mul(unit_ms)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: u64,
    pub exp: u64,
}

pub fn issue_token(
    user: &User,
    secret: &str,
    lifetime_ms: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    let claims = SessionClaims {
        sub: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        iat: now,
        exp: now + lifetime_ms / 1000,
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Returns `None` for a bad signature, a malformed token or an expired one.
pub fn verify_token(token: &str, secret: &str) -> Option<SessionClaims> {
    let validation = Validation::new(Algorithm::HS256);
    jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()
    .map(|data| data.claims)
}

pub fn session_cookie(token: String, lifetime_ms: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(time::Duration::seconds((lifetime_ms / 1000) as i64))
        .build()
}

/// An expired, empty cookie that makes the browser drop the session.
pub fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn user() -> User {
        User {
            id: "u1".to_string(),
            name: "Max".to_string(),
            email: "max@example.de".to_string(),
            password_hash: String::new(),
            role: "kunde".to_string(),
            salutation: None,
            company: None,
            company_url: None,
            phone: None,
            department: None,
            position: None,
            last_login_at: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_parse_duration_ms() {
        assert_eq!(parse_duration_ms("7d"), Some(7 * 24 * 60 * 60 * 1000));
        assert_eq!(parse_duration_ms("12h"), Some(12 * 60 * 60 * 1000));
        assert_eq!(parse_duration_ms("30"), Some(30 * 24 * 60 * 60 * 1000));
        assert_eq!(parse_duration_ms(" 1d "), Some(24 * 60 * 60 * 1000));
        assert_eq!(parse_duration_ms("0d"), None);
        assert_eq!(parse_duration_ms("7w"), None);
        assert_eq!(parse_duration_ms(""), None);
        assert_eq!(parse_duration_ms("d"), None);
    }

    #[test]
    fn test_issue_and_verify() {
        let token = issue_token(&user(), SECRET, 7 * DAY_MS).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, "kunde");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(&user(), SECRET, DAY_MS).unwrap();
        assert!(verify_token(&token, "another-secret-another-secret-xx").is_none());
        assert!(verify_token("not.a.token", SECRET).is_none());
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), 12 * HOUR_MS, true);
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.max_age(),
            Some(time::Duration::seconds(12 * 60 * 60))
        );

        let dev = session_cookie("abc".to_string(), HOUR_MS, false);
        assert_eq!(dev.secure(), Some(false));
    }
}
