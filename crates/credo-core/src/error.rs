// Error taxonomy for the credential service.
//
// `AuthError` is the single caller-facing error type; every variant carries
// an HTTP status and a stable machine-readable code. Backend failures are
// reported through `StoreError`/`QueueError` and converted at the service
// boundary.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Result alias for service-level operations.
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Result alias for record-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Caller-facing error for registration, login, token, and verification flows.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// Malformed or rejected input, keyed by field name.
    #[error("validation failed: {fields:?}")]
    Validation {
        fields: BTreeMap<String, Vec<String>>,
    },

    /// A unique value (email, username) is already taken or reserved.
    #[error("conflict on field {field}")]
    Conflict { field: String },

    /// Too many requests inside the sliding window.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Bad, expired, or rotated-away token. Deliberately indistinguishable.
    #[error("invalid token")]
    InvalidToken,

    /// Referenced record does not exist.
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// A mandatory dependency (the record store) is unreachable.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Anything unexpected. Detail goes to logs, not to the caller.
    #[error("internal error")]
    Internal(String),
}

impl AuthError {
    /// Single-field validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), vec![message.into()]);
        Self::Validation { fields }
    }

    pub fn conflict(field: impl Into<String>) -> Self {
        Self::Conflict { field: field.into() }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    /// Stable machine-readable code for the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DependencyUnavailable(_) => "DEPENDENCY_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error maps to at the boundary.
    pub fn status(&self) -> HttpStatus {
        match self {
            Self::Validation { .. } => HttpStatus::BadRequest,
            Self::Conflict { .. } => HttpStatus::Conflict,
            Self::RateLimited { .. } => HttpStatus::TooManyRequests,
            Self::InvalidCredentials | Self::InvalidToken => HttpStatus::Unauthorized,
            Self::NotFound { .. } => HttpStatus::NotFound,
            Self::DependencyUnavailable(_) => HttpStatus::ServiceUnavailable,
            Self::Internal(_) => HttpStatus::InternalServerError,
        }
    }

    /// Build a JSON body for the error response.
    ///
    /// Internal detail is withheld; `Internal` serializes as an opaque error.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Validation { fields } => serde_json::json!({
                "code": self.code(),
                "fields": fields,
            }),
            Self::Conflict { field } => serde_json::json!({
                "code": self.code(),
                "field": field,
            }),
            Self::RateLimited { retry_after } => serde_json::json!({
                "code": self.code(),
                "retry_after": retry_after,
            }),
            _ => serde_json::json!({
                "code": self.code(),
                "message": match self {
                    Self::Internal(_) => "internal error".to_string(),
                    other => other.to_string(),
                },
            }),
        }
    }
}

/// HTTP status codes used by the error mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpStatus {
    Ok = 200,
    Created = 201,
    BadRequest = 400,
    Unauthorized = 401,
    NotFound = 404,
    Conflict = 409,
    TooManyRequests = 429,
    InternalServerError = 500,
    ServiceUnavailable = 503,
}

impl HttpStatus {
    pub fn status_code(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

/// Record-store failure, reported by backend implementations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A unique index rejected the write. `field` names the violated index.
    #[error("unique constraint violated on {field}")]
    UniqueViolation { field: String },

    /// The store itself is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("store error: {0}")]
    Backend(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation { field } => AuthError::Conflict { field },
            StoreError::Unavailable(detail) => AuthError::DependencyUnavailable(detail),
            StoreError::Backend(detail) => AuthError::Internal(detail),
        }
    }
}

/// Provisioning-queue failure. Swallowed and logged on the request path;
/// the compensation worker treats it as a transient condition.
#[derive(Debug, Clone, thiserror::Error)]
#[error("queue unavailable: {0}")]
pub struct QueueError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::validation("email", "bad").status().status_code(), 400);
        assert_eq!(AuthError::conflict("email").status().status_code(), 409);
        assert_eq!(AuthError::RateLimited { retry_after: 3 }.status().status_code(), 429);
        assert_eq!(AuthError::InvalidCredentials.status().status_code(), 401);
        assert_eq!(AuthError::InvalidToken.status().status_code(), 401);
        assert_eq!(AuthError::not_found("account").status().status_code(), 404);
        assert_eq!(
            AuthError::DependencyUnavailable("db".into()).status().status_code(),
            503
        );
        assert_eq!(AuthError::internal("boom").status().status_code(), 500);
    }

    #[test]
    fn test_internal_detail_is_withheld() {
        let err = AuthError::internal("connection string leaked");
        let body = err.to_json();
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert!(!body.to_string().contains("connection string"));
    }

    #[test]
    fn test_validation_collects_field_messages() {
        let err = AuthError::validation("email", "domain has no MX records");
        if let AuthError::Validation { fields } = &err {
            assert_eq!(fields["email"], vec!["domain has no MX records"]);
        } else {
            panic!("expected Validation");
        }
        assert_eq!(err.to_json()["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_store_error_conversion() {
        let conflict: AuthError = StoreError::UniqueViolation { field: "email".into() }.into();
        assert!(matches!(conflict, AuthError::Conflict { ref field } if field == "email"));

        let unavailable: AuthError = StoreError::Unavailable("pg down".into()).into();
        assert!(matches!(unavailable, AuthError::DependencyUnavailable(_)));

        let internal: AuthError = StoreError::Backend("syntax".into()).into();
        assert!(matches!(internal, AuthError::Internal(_)));
    }

    #[test]
    fn test_rate_limited_body_carries_retry_after() {
        let body = AuthError::RateLimited { retry_after: 42 }.to_json();
        assert_eq!(body["retry_after"], 42);
    }
}
