//! Typed HTTP client for the LeadGenPro API.
//!
//! Used by the intake forms and the CLI. Every response is decoded into the
//! shared [`ApiResponse`] envelope; non-2xx answers become
//! [`ClientError::Api`] carrying the server message.

mod store;

pub use store::{FileTokenStore, MemoryTokenStore, StoredSession, TokenStore};

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::api::response::ApiResponse;
use crate::db::{
    AuthPayload, CreateCommunicationRequest, CreateLeadRequest, Lead, LeadStats, LoginRequest,
    RegisterRequest, UpdateStatusRequest, UserResponse,
};
use crate::intake::LeadSink;

/// Shown when the server gives no usable message
pub const GENERIC_FAILURE: &str = "Die Anfrage ist fehlgeschlagen. Bitte versuchen Sie es später erneut.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        errors: Vec<String>,
    },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("session storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// HTTP status for API errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Decode a response body into the envelope. Failures and non-2xx statuses
/// become errors.
pub fn decode_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<ApiResponse<T>, ClientError> {
    let parsed = serde_json::from_slice::<ApiResponse<T>>(body);

    if !status.is_success() {
        // Error bodies are decoded without the payload type
        let envelope = serde_json::from_slice::<ApiResponse<serde_json::Value>>(body).ok();
        let (message, errors) = match envelope {
            Some(e) => (
                e.message.filter(|m| !m.is_empty()),
                e.errors.unwrap_or_default(),
            ),
            None => (None, Vec::new()),
        };
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            errors,
        });
    }

    let envelope = parsed.map_err(|e| ClientError::Decode(e.to_string()))?;
    if !envelope.success {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope
                .message
                .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            errors: envelope.errors.unwrap_or_default(),
        });
    }
    Ok(envelope)
}

fn require_data<T>(envelope: ApiResponse<T>) -> Result<T, ClientError> {
    envelope
        .data
        .ok_or_else(|| ClientError::Decode("response carries no data".to_string()))
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The signed-in user, if a session is stored
    pub fn current_user(&self) -> Option<UserResponse> {
        self.store.load().map(|s| s.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.load().is_some()
    }

    async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");

        if let Some(session) = self.store.load() {
            request = request.bearer_auth(session.token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(method = %method, url = %url, error = %e, "API request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        let bytes = response.bytes().await?;
        let result = decode_envelope(status, &bytes);

        if let Err(ClientError::Api { message, .. }) = &result {
            tracing::warn!(method = %method, url = %url, status = status.as_u16(), message = %message, "API returned an error");
        }
        result
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        require_data(self.request::<T, ()>(Method::GET, path, None).await?)
    }

    async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        require_data(self.request(method, path, Some(body)).await?)
    }

    fn persist(&self, payload: &AuthPayload) -> Result<(), ClientError> {
        self.store.save(&StoredSession {
            token: payload.token.clone(),
            user: payload.user.clone(),
        })
    }

    /// Sign in and keep the session
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let payload: AuthPayload = self.send(Method::POST, "/api/auth/login", &request).await?;
        self.persist(&payload)?;
        Ok(payload)
    }

    /// Create an account and keep the session
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, ClientError> {
        let payload: AuthPayload = self
            .send(Method::POST, "/api/auth/register", request)
            .await?;
        self.persist(&payload)?;
        Ok(payload)
    }

    /// Forget the stored session. No request is made.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.store.clear()
    }

    pub async fn me(&self) -> Result<UserResponse, ClientError> {
        self.get("/api/auth/me").await
    }

    /// Public form submission
    pub async fn create_lead(&self, request: &CreateLeadRequest) -> Result<Lead, ClientError> {
        self.send(Method::POST, "/api/leads/create", request).await
    }

    pub async fn list_leads(&self) -> Result<Vec<Lead>, ClientError> {
        self.get("/api/leads").await
    }

    pub async fn lead_stats(&self) -> Result<LeadStats, ClientError> {
        self.get("/api/leads/stats").await
    }

    pub async fn get_lead(&self, id: &str) -> Result<Lead, ClientError> {
        self.get(&format!("/api/leads/{}", id)).await
    }

    pub async fn update_status(&self, id: &str, status: &str) -> Result<Lead, ClientError> {
        let request = UpdateStatusRequest {
            status: status.to_string(),
        };
        self.send(Method::PATCH, &format!("/api/leads/{}/status", id), &request)
            .await
    }

    pub async fn add_communication(
        &self,
        id: &str,
        request: &CreateCommunicationRequest,
    ) -> Result<Lead, ClientError> {
        self.send(
            Method::POST,
            &format!("/api/leads/{}/communication", id),
            request,
        )
        .await
    }

    /// Dashboard payload as raw JSON
    pub async fn dashboard(&self) -> Result<serde_json::Value, ClientError> {
        self.get("/api/dashboard").await
    }
}

#[async_trait]
impl LeadSink for ApiClient {
    async fn create_lead(&self, request: CreateLeadRequest) -> Result<Lead, ClientError> {
        ApiClient::create_lead(self, &request).await
    }
}
