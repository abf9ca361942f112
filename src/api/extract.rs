use axum::extract::FromRequest;

use super::error::ApiError;

/// `axum::Json` whose rejections render as the API envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
