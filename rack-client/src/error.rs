//! Backend error types
//!
//! Every failure coming out of the hosted backend is classified once, here,
//! into a [`BackendErrorKind`]. Callers branch on the kind, never on the
//! message text.

use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use std::fmt;
use thiserror::Error;

/// What went wrong, independent of the wording the backend used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendErrorKind {
    /// Email/password rejected
    InvalidCredentials,
    /// Email already registered with the auth provider
    AlreadyRegistered,
    /// Row-level security or grant denied the operation
    PermissionDenied,
    /// No matching row
    NotFound,
    /// Missing or expired session/JWT
    Unauthorized,
    /// Unique or foreign-key conflict
    Conflict,
    /// Request rejected as malformed or invalid
    Validation,
    /// Backend unreachable
    Network,
    /// Request timed out
    Timeout,
    /// Response could not be decoded
    Decode,
    Other,
}

impl BackendErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::AlreadyRegistered => "already_registered",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
            Self::Other => "other",
        }
    }

    /// Backend could not be reached at all
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified backend failure
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    /// Human-readable message as reported by the backend (for logs)
    pub message: String,
    /// HTTP status, when the failure came from a response
    pub status: Option<u16>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::PermissionDenied, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unauthorized, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Decode, message)
    }

    pub fn is(&self, kind: BackendErrorKind) -> bool {
        self.kind == kind
    }

    /// Classify an error response from the auth or REST API.
    ///
    /// Structured codes win over the HTTP status:
    /// - GoTrue `error_code` / legacy `error`
    /// - PostgREST / Postgres `code` (SQLSTATE or `PGRSTxxx`)
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed.message().unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.to_string()
            }
        });

        let kind = parsed
            .auth_kind()
            .or_else(|| parsed.rest_kind())
            .unwrap_or_else(|| kind_from_status(status));

        Self::new(kind, message).with_status(status)
    }
}

fn kind_from_status(status: u16) -> BackendErrorKind {
    match status {
        401 => BackendErrorKind::Unauthorized,
        403 => BackendErrorKind::PermissionDenied,
        404 | 406 => BackendErrorKind::NotFound,
        409 => BackendErrorKind::Conflict,
        400 | 422 => BackendErrorKind::Validation,
        408 | 504 => BackendErrorKind::Timeout,
        502 | 503 => BackendErrorKind::Network,
        _ => BackendErrorKind::Other,
    }
}

/// Union of the error shapes GoTrue and PostgREST return
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    /// PostgREST: SQLSTATE / PGRST code (string); GoTrue: HTTP status (number)
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        self.msg
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
    }

    fn auth_kind(&self) -> Option<BackendErrorKind> {
        let code = self.error_code.as_deref().or(self.error.as_deref())?;
        match code {
            "invalid_credentials" | "invalid_grant" => Some(BackendErrorKind::InvalidCredentials),
            "email_exists" | "user_already_exists" | "phone_exists" => {
                Some(BackendErrorKind::AlreadyRegistered)
            }
            "user_not_found" => Some(BackendErrorKind::NotFound),
            "weak_password" | "validation_failed" | "email_address_invalid" => {
                Some(BackendErrorKind::Validation)
            }
            "bad_jwt" | "no_authorization" | "session_not_found" | "session_expired" => {
                Some(BackendErrorKind::Unauthorized)
            }
            "not_admin" => Some(BackendErrorKind::PermissionDenied),
            "request_timeout" => Some(BackendErrorKind::Timeout),
            _ => None,
        }
    }

    fn rest_kind(&self) -> Option<BackendErrorKind> {
        let code = self.code.as_ref()?.as_str()?;
        match code {
            "42501" => Some(BackendErrorKind::PermissionDenied),
            "PGRST116" => Some(BackendErrorKind::NotFound),
            "23505" | "23503" => Some(BackendErrorKind::Conflict),
            "PGRST301" | "PGRST302" => Some(BackendErrorKind::Unauthorized),
            "57014" => Some(BackendErrorKind::Timeout),
            c if c.starts_with("22") || c.starts_with("23") || c.starts_with("PGRST1") => {
                Some(BackendErrorKind::Validation)
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            BackendErrorKind::Timeout
        } else if e.is_decode() {
            BackendErrorKind::Decode
        } else if e.is_connect() || e.is_request() {
            BackendErrorKind::Network
        } else {
            BackendErrorKind::Other
        };
        let mut err = Self::new(kind, e.to_string());
        err.status = e.status().map(|s| s.as_u16());
        err
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::decode(e.to_string())
    }
}

impl From<BackendError> for AppError {
    fn from(e: BackendError) -> Self {
        let code = match e.kind {
            BackendErrorKind::InvalidCredentials => ErrorCode::InvalidCredentials,
            BackendErrorKind::AlreadyRegistered => ErrorCode::EmailAlreadyRegistered,
            BackendErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            BackendErrorKind::NotFound => ErrorCode::NotFound,
            BackendErrorKind::Unauthorized => ErrorCode::NotAuthenticated,
            BackendErrorKind::Conflict => ErrorCode::AlreadyExists,
            BackendErrorKind::Validation => ErrorCode::BackendRejected,
            BackendErrorKind::Network => ErrorCode::NetworkError,
            BackendErrorKind::Timeout => ErrorCode::TimeoutError,
            BackendErrorKind::Decode => ErrorCode::BackendDecodeFailed,
            BackendErrorKind::Other => ErrorCode::InternalError,
        };
        AppError::with_message(code, e.message)
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;
