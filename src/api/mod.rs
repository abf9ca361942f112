pub mod auth;
mod dashboard;
pub mod error;
pub mod extract;
mod leads;
pub mod metrics;
pub mod rate_limit;
pub mod response;
pub mod session;
mod uploads;
mod users;
pub mod validation;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::{ServerConfig, StorageKind};
use crate::AppState;
use response::ApiResponse;

/// Files accepted in one attachment request
const MAX_FILES_PER_REQUEST: usize = 10;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Login and registration get their own, tighter budget
    let auth_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_auth,
        ));

    // Public form submissions
    let intake_routes = Router::new()
        .route("/leads/create", post(leads::create_public))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_intake,
        ));

    let upload_limit =
        state.config.uploads.max_file_size * MAX_FILES_PER_REQUEST + 1024 * 1024;

    // Authenticated API; each handler checks the caller's role
    let api_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Leads
        .route("/leads", get(leads::list).post(leads::create_manual))
        .route("/leads/stats", get(leads::stats))
        .route("/leads/:id", get(leads::get))
        .route("/leads/:id/status", patch(leads::update_status))
        .route("/leads/:id/communication", post(leads::add_communication))
        .route(
            "/leads/:id/attachments",
            post(uploads::upload_attachments).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Dashboard
        .route("/dashboard", get(dashboard::get_dashboard))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/profile", put(users::update_profile))
        .route("/users/password", put(users::change_password))
        .route("/users/:id/role", patch(users::update_role))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_api,
        ));

    let api = Router::new()
        .merge(auth_routes)
        .merge(intake_routes)
        .merge(api_routes);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .nest("/api", api);

    if state.config.uploads.storage == StorageKind::Local {
        let dir = state
            .config
            .uploads
            .local_dir(&state.config.server.data_dir);
        router = router.nest_service("/uploads", ServeDir::new(dir));
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics::metrics_middleware,
        ))
        .layer(cors_layer(&state.config.server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins. Without origins only same-origin
/// requests pass.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    version: &'static str,
    database: bool,
    uptime_seconds: u64,
    requests: u64,
}

async fn health_check(State(state): State<Arc<AppState>>) -> ApiResponse<Health> {
    let database = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    ApiResponse::ok(Health {
        status: if database { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        uptime_seconds: state.monitor.uptime().as_secs(),
        requests: state.monitor.total_requests(),
    })
}
