use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use leadgen::api::auth::hash_password;
use leadgen::api::create_router;
use leadgen::api::metrics::UNMATCHED_ROUTE;
use leadgen::config::Config;
use leadgen::db::{init_memory, Attachment, NewUser, Role, User};
use leadgen::storage::LocalFileStore;
use leadgen::AppState;

// ─── Test helpers ───────────────────────────────────────────────────────

const SECRET: &str = "integration-test-secret-0123456789abcdef";
const PASSWORD: &str = "geheim123";

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    uploads: TempDir,
}

async fn test_app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.rate_limit.enabled = false;
    config.uploads.local_dir = Some(uploads.path().to_path_buf());
    config.validate().unwrap();

    let db = init_memory().await.unwrap();
    let store = Arc::new(LocalFileStore::new(uploads.path()));
    let state = Arc::new(AppState::new(config, db, store));

    TestApp {
        router: create_router(state.clone()),
        state,
        uploads,
    }
}

async fn create_user(app: &TestApp, email: &str, role: Role) -> User {
    User::insert(
        &app.state.db,
        &NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password_hash: hash_password(PASSWORD).unwrap(),
            role,
            salutation: None,
            company: None,
            company_url: None,
            phone: None,
        },
    )
    .await
    .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value, header::HeaderMap) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body, headers)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn login(app: &TestApp, email: &str) -> String {
    let (status, body, _) = send(
        app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["data"]["token"].as_str().unwrap().to_string()
}

fn lead_payload(email: &str) -> Value {
    json!({
        "salutation": "frau",
        "name": "Erika Musterfrau",
        "email": email,
        "source": "contact",
        "privacyConsent": true,
        "serviceDetails": { "contact": { "subject": "Rückruf" } }
    })
}

async fn create_lead(app: &TestApp, email: &str) -> Value {
    let (status, body, _) = send(
        app,
        json_request("POST", "/api/leads/create", None, lead_payload(email)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
    body["data"].clone()
}

// ─── Tests ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_uses_envelope() {
    let app = test_app().await;
    let (status, body, _) = send(
        &app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], true);
}

#[tokio::test]
async fn test_created_lead_shows_up_in_stats() {
    let app = test_app().await;
    create_user(&app, "vertrieb@lead.online", Role::Vertrieb).await;
    let token = login(&app, "vertrieb@lead.online").await;

    let (_, before, _) = send(&app, get_request("/api/leads/stats", &token)).await;
    assert_eq!(before["data"]["total"], 0);

    let (status, body, _) = send(
        &app,
        json_request(
            "POST",
            "/api/leads/create",
            None,
            lead_payload("Erika@Example.de "),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "new");
    assert_eq!(body["data"]["priority"], "medium");
    assert_eq!(body["data"]["email"], "erika@example.de");

    let (_, after, _) = send(&app, get_request("/api/leads/stats", &token)).await;
    assert_eq!(after["data"]["total"], 1);
    assert_eq!(after["data"]["bySource"]["contact"], 1);
}

#[tokio::test]
async fn test_public_validation_reports_first_field() {
    let app = test_app().await;

    let mut payload = lead_payload("erika@example.de");
    payload["name"] = json!("   ");
    payload["privacyConsent"] = json!(false);

    let (status, body, _) = send(
        &app,
        json_request("POST", "/api/leads/create", None, payload),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Bitte geben Sie Ihren Namen an.");
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);

    let mut manual = lead_payload("erika@example.de");
    manual["source"] = json!("manual");
    let (status, _, _) = send(
        &app,
        json_request("POST", "/api/leads/create", None, manual),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = test_app().await;
    create_user(&app, "admin@lead.online", Role::Admin).await;

    let (status, body, headers) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "ADMIN@lead.online", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["user"].get("passwordHash").is_none());
    assert!(body["data"]["user"].get("password_hash").is_none());

    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
    assert!(!cookie.contains("Secure"));

    // The cookie alone authenticates
    let token_pair = cookie.split(';').next().unwrap().to_string();
    let (status, body, _) = send(
        &app,
        Request::builder()
            .uri("/api/auth/me")
            .header(header::COOKIE, token_pair)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");

    let (status, _, _) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "admin@lead.online", "password": "falsch123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_transitions() {
    let app = test_app().await;
    create_user(&app, "vertrieb@lead.online", Role::Vertrieb).await;
    let token = login(&app, "vertrieb@lead.online").await;
    let lead = create_lead(&app, "kunde@example.de").await;
    let uri = format!("/api/leads/{}/status", lead["id"].as_str().unwrap());

    let (status, body, _) = send(
        &app,
        json_request("PATCH", &uri, Some(&token), json!({ "status": "contacted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "contacted");

    // Same status again is a no-op
    let (status, _, _) = send(
        &app,
        json_request("PATCH", &uri, Some(&token), json!({ "status": "contacted" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = send(
        &app,
        json_request("PATCH", &uri, Some(&token), json!({ "status": "closed-won" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _, _) = send(
        &app,
        json_request("PATCH", &uri, Some(&token), json!({ "status": "archived" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_customer_sees_only_own_leads() {
    let app = test_app().await;

    let own = create_lead(&app, "kunde@example.de").await;
    let other = create_lead(&app, "fremd@example.de").await;

    let (status, body, _) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({
                "name": "Karl Kunde",
                "email": "kunde@example.de",
                "password": "sicher123"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    assert_eq!(body["data"]["user"]["role"], "kunde");
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (_, body, _) = send(&app, get_request("/api/leads", &token)).await;
    let leads = body["data"].as_array().unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["id"], own["id"]);
    assert!(leads[0]["customerId"].is_string());

    let (status, _, _) = send(
        &app,
        get_request(
            &format!("/api/leads/{}", other["id"].as_str().unwrap()),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/leads/{}/status", own["id"].as_str().unwrap()),
            Some(&token),
            json!({ "status": "contacted" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body, _) = send(&app, get_request("/api/dashboard", &token)).await;
    assert_eq!(body["data"]["view"], "customer");
    assert_eq!(body["data"]["stats"]["total"], 1);
    assert_eq!(body["data"]["leads"][0]["statusBadge"]["label"], "Neu");
}

#[tokio::test]
async fn test_communication_and_attachment() {
    let app = test_app().await;
    create_user(&app, "vertrieb@lead.online", Role::Vertrieb).await;
    let token = login(&app, "vertrieb@lead.online").await;
    let lead = create_lead(&app, "kunde@example.de").await;
    let id = lead["id"].as_str().unwrap().to_string();

    let (status, body, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/leads/{}/communication", id),
            Some(&token),
            json!({ "type": "phone", "content": "Rückruf vereinbart" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["communications"][0]["type"], "phone");
    assert_eq!(body["data"]["communications"][0]["direction"], "outbound");

    let boundary = "leadgen-boundary";
    let multipart = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notiz.txt\"\r\nContent-Type: text/plain\r\n\r\nHallo Welt\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/leads/{}/attachments", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart))
        .unwrap();

    let (status, body, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED, "upload failed: {}", body);
    let attachment = &body["data"][0];
    assert_eq!(attachment["originalName"], "notiz.txt");
    assert_eq!(attachment["mimeType"], "text/plain");
    assert_eq!(attachment["size"], 10);

    let filename = attachment["filename"].as_str().unwrap();
    assert!(filename.ends_with(".txt"));
    let stored = std::fs::read(app.uploads.path().join(&id).join(filename)).unwrap();
    assert_eq!(stored, b"Hallo Welt");

    let bad = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"tool.exe\"\r\nContent-Type: application/x-msdownload\r\n\r\nMZ\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/leads/{}/attachments", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(bad))
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_management_requires_admin() {
    let app = test_app().await;
    create_user(&app, "admin@lead.online", Role::Admin).await;
    let sales = create_user(&app, "vertrieb@lead.online", Role::Vertrieb).await;

    let sales_token = login(&app, "vertrieb@lead.online").await;
    let (status, _, _) = send(&app, get_request("/api/users", &sales_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = login(&app, "admin@lead.online").await;
    let (status, body, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/users/{}/role", sales.id),
            Some(&admin_token),
            json!({ "role": "Kunde" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/users/{}/role", sales.id),
            Some(&admin_token),
            json!({ "role": "kunde" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "kunde");

    // The role is read per request, so the old token loses staff rights
    let (status, _, _) = send(
        &app,
        json_request(
            "PATCH",
            "/api/leads/unknown/status",
            Some(&sales_token),
            json!({ "status": "contacted" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rejected_upload_stores_nothing() {
    let app = test_app().await;
    create_user(&app, "vertrieb@lead.online", Role::Vertrieb).await;
    let token = login(&app, "vertrieb@lead.online").await;
    let lead = create_lead(&app, "kunde@example.de").await;
    let id = lead["id"].as_str().unwrap().to_string();

    // The first file is fine, the second one is not
    let boundary = "leadgen-boundary";
    let multipart = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"ok.txt\"\r\nContent-Type: text/plain\r\n\r\nHallo\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"tool.exe\"\r\nContent-Type: application/x-msdownload\r\n\r\nMZ\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/leads/{}/attachments", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart))
        .unwrap();

    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let attachments = Attachment::list_for_lead(&app.state.db, &id).await.unwrap();
    assert!(attachments.is_empty());
    assert!(!app.uploads.path().join(&id).exists());
}

#[tokio::test]
async fn test_unmatched_paths_share_one_monitor_entry() {
    let app = test_app().await;

    for i in 0..50 {
        let (status, _, _) = send(
            &app,
            Request::builder()
                .uri(format!("/nope-{}", i))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let summary = app.state.monitor.summary();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].route, format!("GET {}", UNMATCHED_ROUTE));
    assert_eq!(summary[0].count, 50);
}
