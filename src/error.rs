//! Typed errors and HTTP mapping.

use crate::model::{MethodKind, PropertyKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Startup-time registration failures. Fatal: these halt initialization.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("duplicate name '{0}' for model registry")]
    DuplicateModel(String),
    #[error("duplicate property '{property}' in model '{model}'")]
    DuplicateProperty { model: String, property: String },
    #[error("duplicate name '{0}' for specials registry")]
    DuplicateSpecial(String),
    #[error("duplicate {kind} '{name}' on '{owner}'")]
    DuplicateMethod {
        kind: MethodKind,
        owner: String,
        name: String,
    },
    #[error("no owner '{owner}' to register a {kind} on")]
    UnknownOwner { kind: MethodKind, owner: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load: {0}")]
    Load(String),
    #[error("config parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("validation: {0}")]
    Validation(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Failures reported by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("entity of '{0}' has no id; create it before saving")]
    Unsaved(String),
    #[error("storage: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum CoercionError {
    #[error("invalid {kind} value '{value}': {reason}")]
    Invalid {
        kind: PropertyKind,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Error returned by a registered method. The message may be shown to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MethodError(pub String);

impl From<String> for MethodError {
    fn from(s: String) -> Self {
        MethodError(s)
    }
}

impl From<&str> for MethodError {
    fn from(s: &str) -> Self {
        MethodError(s.to_string())
    }
}

/// Request-time failures. Every variant maps to a status code; none escapes the dispatcher.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid URL for {verb}: '{path}'")]
    InvalidPath { verb: String, path: String },
    #[error("model '{0}' not found")]
    UnknownModel(String),
    #[error("special object '{0}' not found")]
    UnknownSpecial(String),
    #[error("{kind} '{method}' not found on '{owner}'")]
    UnknownMethod {
        kind: MethodKind,
        owner: String,
        method: String,
    },
    #[error("id '{0}' is not numeric")]
    InvalidId(String),
    #[error("entity {0} not found")]
    EntityNotFound(String),
    #[error("can't call {target}: {message}")]
    Invocation { target: String, message: String },
    #[error("malformed body: {0}")]
    MalformedBody(String),
    #[error("property '{property}': {source}")]
    InvalidValue {
        property: String,
        #[source]
        source: CoercionError,
    },
    #[error("verb {0} not supported")]
    UnsupportedVerb(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidPath { .. } => (StatusCode::BAD_REQUEST, "invalid_path"),
            AppError::UnknownModel(_) | AppError::UnknownSpecial(_) | AppError::UnknownMethod { .. } => {
                (StatusCode::BAD_REQUEST, "unknown_name")
            }
            AppError::InvalidId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
            AppError::EntityNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Invocation { .. } => (StatusCode::BAD_REQUEST, "invocation_error"),
            AppError::MalformedBody(_) => (StatusCode::BAD_REQUEST, "malformed_body"),
            AppError::InvalidValue { source, .. } => match source {
                CoercionError::Invalid { .. } => (StatusCode::BAD_REQUEST, "invalid_value"),
                CoercionError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            },
            AppError::UnsupportedVerb(_) => (StatusCode::METHOD_NOT_ALLOWED, "unsupported_verb"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (_, code) = self.status_and_code();
        ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        }
    }

    /// Machine-readable context for errors that name a specific property or method.
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InvalidValue { property, source } => {
                let mut details = serde_json::json!({ "property": property });
                if let CoercionError::Invalid { kind, .. } = source {
                    details["kind"] = serde_json::Value::String(kind.to_string());
                }
                Some(details)
            }
            AppError::UnknownMethod { kind, owner, method } => Some(serde_json::json!({
                "kind": kind.to_string(),
                "owner": owner,
                "method": method,
            })),
            _ => None,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, _) = self.status_and_code();
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invalid_value_names_the_property() {
        let err = AppError::InvalidValue {
            property: "number".into(),
            source: CoercionError::Invalid {
                kind: PropertyKind::Integer,
                value: "seven".into(),
                reason: "invalid digit".into(),
            },
        };
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(body["error"]["code"], json!("invalid_value"));
        assert_eq!(body["error"]["details"], json!({"property": "number", "kind": "integer"}));
    }

    #[test]
    fn details_are_omitted_when_absent() {
        let body = serde_json::to_value(AppError::UnknownModel("Nurse".into()).body()).unwrap();
        assert!(body["error"].get("details").is_none());
        let body = serde_json::to_value(
            AppError::UnknownMethod {
                kind: MethodKind::Special,
                owner: "meta".into(),
                method: "nope".into(),
            }
            .body(),
        )
        .unwrap();
        assert_eq!(body["error"]["details"]["method"], json!("nope"));
    }
}
