//! HTTP mapping for [`AppError`].

use ab_core::error::AppError;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;

fn status_and_message(err: &AppError) -> (StatusCode, String) {
    match err {
        AppError::NotFound(..) => (StatusCode::NOT_FOUND, err.to_string()),
        AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AppError::Internal(detail) => {
            tracing::error!(error = %detail, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = status_and_message(&self.0);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Error page for the HTML routes.
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl From<askama::Error> for PageError {
    fn from(err: askama::Error) -> Self {
        PageError(AppError::Internal(format!("template rendering failed: {err}")))
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = status_and_message(&self.0);
        (status, Html(error_page(status, &message))).into_response()
    }
}

fn error_page(status: StatusCode, message: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("Error");
    format!(
        "<!DOCTYPE html><html><head><title>{reason}</title></head><body><h1>{reason}</h1><p>{}</p><a href=\"/\">Home</a></body></html>",
        html_escape::encode_safe(message)
    )
}
