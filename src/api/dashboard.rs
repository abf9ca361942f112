use axum::extract::State;
use std::sync::Arc;

use super::auth::AuthUser;
use super::error::ApiError;
use super::response::ApiResponse;
use crate::dashboard::DashboardData;
use crate::db::Lead;
use crate::AppState;

/// GET /api/dashboard - the caller's view with stats and labelled leads
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<ApiResponse<DashboardData>, ApiError> {
    let leads = Lead::list(&state.db).await?;
    let data = DashboardData::build(user.0, leads, state.config.dashboard.legacy_company_match);
    Ok(ApiResponse::ok(data))
}
