//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Inventory errors
//! - 8xxx: Backend errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Serialized as a plain u16 so the console, the admin service and any
/// frontend agree on the same numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials (email/password)
    InvalidCredentials = 1002,
    /// Email is already registered with the auth provider
    EmailAlreadyRegistered = 1008,
    /// Password does not meet the minimum length
    PasswordTooShort = 1009,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,

    // ==================== 3xxx: Inventory ====================
    ProductNotFound = 3001,
    RackNotFound = 3101,
    RackCapacityInvalid = 3102,
    CategoryNotFound = 3201,
    ProductCodeNotFound = 3301,
    ProductCodeExists = 3302,
    UserNotFound = 3401,

    // ==================== 8xxx: Backend ====================
    /// Hosted backend rejected the request
    BackendRejected = 8001,
    /// Hosted backend returned an unreadable response
    BackendDecodeFailed = 8002,
    /// Privileged admin key is not configured
    AdminKeyMissing = 8003,

    // ==================== 9xxx: System ====================
    InternalError = 9001,
    StorageError = 9002,
    NetworkError = 9003,
    TimeoutError = 9004,
    /// Data store was shut down
    StoreClosed = 9006,
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidCredentials => "Invalid email or password",
            ErrorCode::EmailAlreadyRegistered => "Email is already registered",
            ErrorCode::PasswordTooShort => "Password must be at least 6 characters",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",

            // Inventory
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::RackNotFound => "Rack not found",
            ErrorCode::RackCapacityInvalid => "Rack capacity must be at least 1",
            ErrorCode::CategoryNotFound => "Category not found",
            ErrorCode::ProductCodeNotFound => "Product code not found",
            ErrorCode::ProductCodeExists => "Product code already exists",
            ErrorCode::UserNotFound => "User not found",

            // Backend
            ErrorCode::BackendRejected => "Backend rejected the request",
            ErrorCode::BackendDecodeFailed => "Backend response could not be decoded",
            ErrorCode::AdminKeyMissing => "Service role key is not configured",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Local storage error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::StoreClosed => "Data store is shut down",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::RequiredField),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1002 => Ok(ErrorCode::InvalidCredentials),
            1008 => Ok(ErrorCode::EmailAlreadyRegistered),
            1009 => Ok(ErrorCode::PasswordTooShort),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),

            // Inventory
            3001 => Ok(ErrorCode::ProductNotFound),
            3101 => Ok(ErrorCode::RackNotFound),
            3102 => Ok(ErrorCode::RackCapacityInvalid),
            3201 => Ok(ErrorCode::CategoryNotFound),
            3301 => Ok(ErrorCode::ProductCodeNotFound),
            3302 => Ok(ErrorCode::ProductCodeExists),
            3401 => Ok(ErrorCode::UserNotFound),

            // Backend
            8001 => Ok(ErrorCode::BackendRejected),
            8002 => Ok(ErrorCode::BackendDecodeFailed),
            8003 => Ok(ErrorCode::AdminKeyMissing),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StorageError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9006 => Ok(ErrorCode::StoreClosed),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
