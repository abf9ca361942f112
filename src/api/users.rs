//! Profile, password and role management.

use axum::extract::{Path, State};
use std::sync::Arc;
use tracing::info;

use super::auth::{hash_password, verify_password, AuthUser};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::response::ApiResponse;
use super::validation::{validate_password_strength, MAX_NAME_LEN};
use crate::db::{
    ChangePasswordRequest, Role, Salutation, UpdateProfileRequest, UpdateRoleRequest, User,
    UserResponse,
};
use crate::AppState;

fn validate_profile(req: &UpdateProfileRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(name) = &req.name {
        errors.check(!name.trim().is_empty(), "name", "Der Name darf nicht leer sein.");
        errors.check(
            name.chars().count() <= MAX_NAME_LEN,
            "name",
            "Der Name ist zu lang.",
        );
    }
    if let Some(salutation) = &req.salutation {
        errors.check(
            salutation.parse::<Salutation>().is_ok(),
            "salutation",
            "Bitte wählen Sie eine gültige Anrede aus.",
        );
    }

    errors.finish()
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(mut request): ApiJson<UpdateProfileRequest>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    validate_profile(&request)?;
    request.name = request.name.map(|n| n.trim().to_string());

    let updated = User::update_profile(&state.db, user.id(), &request).await?;
    Ok(ApiResponse::ok(UserResponse::from(updated)).with_message("Profil aktualisiert"))
}

/// PUT /api/users/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    if !verify_password(&request.current_password, &user.0.password_hash) {
        return Err(ApiError::validation_field("Das aktuelle Passwort ist falsch."));
    }

    if let Some(problem) = validate_password_strength(&request.new_password) {
        return Err(ApiError::validation_field(problem));
    }

    let password_hash = hash_password(&request.new_password).map_err(|e| {
        tracing::error!(error = %e, "Failed to hash password");
        ApiError::internal("Passwort konnte nicht geändert werden")
    })?;

    User::set_password_hash(&state.db, user.id(), &password_hash).await?;
    info!(user_id = %user.id(), "Password changed");

    Ok(ApiResponse::message("Passwort wurde geändert"))
}

/// GET /api/users - admin only
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<ApiResponse<Vec<UserResponse>>, ApiError> {
    user.require_admin()?;

    let users = User::list(&state.db).await?;
    Ok(ApiResponse::ok(
        users.into_iter().map(UserResponse::from).collect(),
    ))
}

/// PATCH /api/users/:id/role - admin only
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateRoleRequest>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    user.require_admin()?;

    let role: Role = request.role.parse().map_err(|_| {
        ApiError::validation_field(format!(
            "Ungültige Rolle: {} (erlaubt: admin, vertrieb, kunde, lead)",
            request.role
        ))
    })?;

    if id == user.id() && role != Role::Admin {
        return Err(ApiError::bad_request(
            "Sie können sich nicht selbst die Administratorrechte entziehen.",
        ));
    }

    if User::set_role(&state.db, &id, role).await? == 0 {
        return Err(ApiError::not_found("Benutzer nicht gefunden"));
    }

    let updated = User::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Benutzer nicht gefunden"))?;

    info!(user_id = %id, role = %role, changed_by = %user.id(), "User role changed");
    Ok(ApiResponse::ok(UserResponse::from(updated)).with_message("Rolle aktualisiert"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_validation() {
        assert!(validate_profile(&UpdateProfileRequest::default()).is_ok());

        let req = UpdateProfileRequest {
            name: Some("  ".to_string()),
            salutation: Some("divers".to_string()),
            ..Default::default()
        };
        let err = validate_profile(&req).unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert_eq!(err.message(), "Der Name darf nicht leer sein.");
    }
}
