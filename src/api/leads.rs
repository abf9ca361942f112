//! Lead intake and pipeline endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::auth::AuthUser;
use super::error::ApiError;
use super::extract::ApiJson;
use super::metrics::record_lead_created;
use super::response::ApiResponse;
use super::validation::{validate_communication, validate_create_lead, LeadOrigin};
use crate::dashboard::{can_see_lead, scope_leads};
use crate::db::{
    Communication, CreateCommunicationRequest, CreateLeadRequest, Lead, LeadStats, LeadStatus,
    StatusWrite, UpdateStatusRequest, User,
};
use crate::notifications::notify_new_lead;
use crate::AppState;

const MSG_NOT_FOUND: &str = "Lead nicht gefunden";

/// POST /api/leads/create - public form submission
pub async fn create_public(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateLeadRequest>,
) -> Result<(StatusCode, ApiResponse<Lead>), ApiError> {
    let new = validate_create_lead(request, LeadOrigin::Public)?;
    let lead = store_lead(&state, new).await?;

    Ok(ApiResponse::ok(lead)
        .with_message("Vielen Dank! Ihre Anfrage wurde erfolgreich übermittelt.")
        .created())
}

/// POST /api/leads - lead entered by staff
pub async fn create_manual(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(request): ApiJson<CreateLeadRequest>,
) -> Result<(StatusCode, ApiResponse<Lead>), ApiError> {
    user.require_staff()?;

    let mut new = validate_create_lead(request, LeadOrigin::Staff)?;
    new.created_by = Some(user.id().to_string());
    let lead = store_lead(&state, new).await?;

    Ok(ApiResponse::ok(lead)
        .with_message("Lead wurde angelegt")
        .created())
}

async fn store_lead(state: &AppState, mut new: crate::db::NewLead) -> Result<Lead, ApiError> {
    if let Some(customer) = User::find_by_email(&state.db, &new.email).await? {
        new.customer_id = Some(customer.id);
    }

    let lead = Lead::insert(&state.db, &new).await?;
    info!(lead_id = %lead.id, source = %lead.source, "Lead created");

    record_lead_created(&lead.source);
    notify_new_lead(state.mailer.clone(), lead.clone());

    Ok(lead)
}

/// GET /api/leads - leads visible to the caller, newest first
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<ApiResponse<Vec<Lead>>, ApiError> {
    let leads = Lead::list(&state.db).await?;
    let leads = scope_leads(&user.0, leads, state.config.dashboard.legacy_company_match);
    Ok(ApiResponse::ok(leads))
}

/// GET /api/leads/stats - statistics over the caller's lead set
pub async fn stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<ApiResponse<LeadStats>, ApiError> {
    let leads = Lead::list(&state.db).await?;
    let leads = scope_leads(&user.0, leads, state.config.dashboard.legacy_company_match);
    Ok(ApiResponse::ok(LeadStats::from_leads(&leads)))
}

/// Load a lead the caller may see. Out-of-scope leads look missing.
async fn find_visible(state: &AppState, user: &AuthUser, id: &str) -> Result<Lead, ApiError> {
    let lead = Lead::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found(MSG_NOT_FOUND))?;

    if can_see_lead(&user.0, &lead, state.config.dashboard.legacy_company_match) {
        Ok(lead)
    } else {
        Err(ApiError::not_found(MSG_NOT_FOUND))
    }
}

/// GET /api/leads/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Lead>, ApiError> {
    let lead = find_visible(&state, &user, &id).await?;
    Ok(ApiResponse::ok(lead))
}

/// PATCH /api/leads/:id/status
///
/// Moves a lead along the pipeline. The write only succeeds when the status
/// is still the one the transition was checked against.
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<ApiResponse<Lead>, ApiError> {
    user.require_staff()?;

    let target: LeadStatus = request.status.parse().map_err(|_| {
        ApiError::validation_field(format!("Unbekannter Status: {}", request.status))
    })?;

    let lead = Lead::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found(MSG_NOT_FOUND))?;

    let current = lead.status_enum().ok_or_else(|| {
        warn!(lead_id = %lead.id, status = %lead.status, "Lead has an unknown stored status");
        ApiError::conflict(format!(
            "Der gespeicherte Status '{}' ist ungültig",
            lead.status
        ))
    })?;

    if current == target {
        return Ok(ApiResponse::ok(lead));
    }

    current.transition(target)?;

    match Lead::update_status(&state.db, &id, current.as_str(), target).await? {
        StatusWrite::Updated => {}
        StatusWrite::Stale => {
            return Err(ApiError::conflict(
                "Der Lead wurde zwischenzeitlich geändert. Bitte laden Sie die Seite neu.",
            ));
        }
    }

    info!(
        lead_id = %id,
        from = %current,
        to = %target,
        user_id = %user.id(),
        "Lead status changed"
    );

    let lead = Lead::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found(MSG_NOT_FOUND))?;
    Ok(ApiResponse::ok(lead).with_message("Status aktualisiert"))
}

/// POST /api/leads/:id/communication - append to the contact log
pub async fn add_communication(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<CreateCommunicationRequest>,
) -> Result<(StatusCode, ApiResponse<Lead>), ApiError> {
    user.require_staff()?;

    let (comm_type, direction) = validate_communication(&request)?;

    if Lead::find(&state.db, &id).await?.is_none() {
        return Err(ApiError::not_found(MSG_NOT_FOUND));
    }

    let subject = request
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    Communication::append(
        &state.db,
        &id,
        comm_type,
        direction,
        subject,
        request.content.trim(),
        request.date.as_deref(),
        Some(user.id()),
    )
    .await?;

    let lead = Lead::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found(MSG_NOT_FOUND))?;
    Ok(ApiResponse::ok(lead)
        .with_message("Kommunikation hinzugefügt")
        .created())
}
