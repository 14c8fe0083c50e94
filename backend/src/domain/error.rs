//! Domain-level error types.
//!
//! These errors are transport agnostic. A transport maps each [`ErrorCode`]
//! onto exactly one status, so clients can reason about retries and
//! duplicate submissions from the code alone.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A required field is missing or malformed, or a value is disallowed.
    InvalidArgument,
    /// No verified caller identity is available.
    Unauthorized,
    /// The caller is neither the owner nor an admin where one is required.
    Forbidden,
    /// The requested resource does not exist.
    NotFound,
    /// A uniqueness rule or duplicate action was rejected.
    AlreadyExists,
    /// The caller already holds a rating with the requested status.
    AlreadyRated,
    /// The request is well formed but semantically disallowed.
    InvalidOperation,
    /// A concurrent update invalidated the observed state; safe to retry.
    Conflict,
    /// A multi-step operation completed some side effects but not others.
    PartialFailure,
    /// The backing store is unreachable.
    ServiceUnavailable,
    /// An unexpected error occurred inside the domain.
    InternalError,
}

impl ErrorCode {
    /// Stable snake_case identifier, identical to the serialised form.
    ///
    /// # Examples
    /// ```
    /// use postboard::domain::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::AlreadyRated.as_str(), "already_rated");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::AlreadyRated => "already_rated",
            Self::InvalidOperation => "invalid_operation",
            Self::Conflict => "conflict",
            Self::PartialFailure => "partial_failure",
            Self::ServiceUnavailable => "service_unavailable",
            Self::InternalError => "internal_error",
        }
    }

    /// Whether the same request may succeed when simply retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Conflict | Self::ServiceUnavailable)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every service operation.
///
/// The message is never blank. `details` carries machine-readable context.
///
/// # Examples
/// ```
/// use postboard::domain::{Error, ErrorCode};
///
/// let err = Error::not_found("post 9 does not exist");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert_eq!(err.to_string(), "not_found: post 9 does not exist");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "ErrorDto", into = "ErrorDto")]
pub struct Error {
    code: ErrorCode,
    message: String,
    details: Option<Value>,
}

/// Rejection from [`Error::try_new`] and deserialisation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    /// Blank message.
    #[error("error message must not be empty")]
    EmptyMessage,
}

macro_rules! code_constructors {
    ($($name:ident => $code:ident),* $(,)?) => {
        $(
            #[doc = concat!("Error with [`ErrorCode::", stringify!($code), "`].")]
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ErrorCode::$code, message)
            }
        )*
    };
}

impl Error {
    /// Build an error. A blank message is replaced by the code's name.
    ///
    /// ```
    /// use postboard::domain::{Error, ErrorCode};
    ///
    /// assert_eq!(Error::new(ErrorCode::Conflict, " ").message(), "conflict");
    /// ```
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::try_new(code, message).unwrap_or_else(|_| Self {
            code,
            message: code.as_str().to_owned(),
            details: None,
        })
    }

    /// Build an error, rejecting a blank message.
    ///
    /// # Errors
    ///
    /// [`ErrorValidationError::EmptyMessage`] when `message` is whitespace.
    pub fn try_new(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    /// Failure category.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured context, such as the duplicate field or the failed step.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured details.
    ///
    /// # Examples
    /// ```
    /// use postboard::domain::Error;
    /// use serde_json::json;
    ///
    /// let err = Error::already_exists("taken").with_details(json!({ "field": "email" }));
    /// assert_eq!(err.details(), Some(&json!({ "field": "email" })));
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    code_constructors! {
        invalid_argument => InvalidArgument,
        unauthorized => Unauthorized,
        forbidden => Forbidden,
        not_found => NotFound,
        already_exists => AlreadyExists,
        already_rated => AlreadyRated,
        invalid_operation => InvalidOperation,
        conflict => Conflict,
        partial_failure => PartialFailure,
        service_unavailable => ServiceUnavailable,
        internal => InternalError,
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDto {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<Error> for ErrorDto {
    fn from(value: Error) -> Self {
        Self {
            code: value.code,
            message: value.message,
            details: value.details,
        }
    }
}

impl TryFrom<ErrorDto> for Error {
    type Error = ErrorValidationError;

    fn try_from(value: ErrorDto) -> Result<Self, Self::Error> {
        let error = Error::try_new(value.code, value.message)?;
        Ok(match value.details {
            Some(details) => error.with_details(details),
            None => error,
        })
    }
}
