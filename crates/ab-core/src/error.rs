//! # AppError
//!
//! Centralized error handling for the Ad Board ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all ab-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Ad, Category, Account)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., non-positive price, email already in use)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Infrastructure failure (e.g., DB down, mail relay unreachable)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }
}

/// A write that would duplicate a unique field. Storage adapters raise this
/// through `anyhow` when a uniqueness constraint rejects the row.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conflict {
    #[error("A user with that username already exists.")]
    Username,
    #[error("A user with that email already exists.")]
    Email,
    #[error("A category with that name already exists.")]
    CategoryName,
}

impl From<Conflict> for AppError {
    fn from(conflict: Conflict) -> Self {
        AppError::ValidationError(conflict.to_string())
    }
}

// Adapters speak anyhow; apart from conflicts, anything they surface is an
// infrastructure failure.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Conflict>() {
            Ok(conflict) => conflict.into(),
            Err(err) => AppError::Internal(format!("{err:#}")),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errs: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errs
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let reasons: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{field}: {}", reasons.join(", "))
            })
            .collect();
        fields.sort();
        AppError::ValidationError(fields.join("; "))
    }
}

/// A specialized Result type for Ad Board logic.
pub type Result<T> = std::result::Result<T, AppError>;
