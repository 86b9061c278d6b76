//! # Errors
//!
//! Kairo core carries one structured error type.
//! Core goals:
//! - a small, closed set of kinds that admin-facing handlers can branch on
//! - can be carried through anyhow::Error (store and handler traits return anyhow)
//! - transport-agnostic (the chat layer decides how to render it)

use std::fmt;

use anyhow::Error as AnyError;

/// A convenience result type for Kairo core APIs.
pub type KairoResult<T> = std::result::Result<T, AnyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,    // malformed input: guild id, module key
    NotFound,      // tenant or command missing
    Conflict,      // registration transition not allowed
    Forbidden,     // privileged-only operation
    Unprocessable, // settings blob could not be decrypted or parsed
    NotConfigured, // optional configuration absent
    Unavailable,   // remote or storage collaborator unreachable
    GeneralError,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::Unprocessable => "Unprocessable",
            ErrorKind::NotConfigured => "NotConfigured",
            ErrorKind::Unavailable => "Unavailable",
            ErrorKind::GeneralError => "GeneralError",
        }
    }

    /// Kebab-cased name, stable for logs and metrics labels.
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Unprocessable => "unprocessable",
            ErrorKind::NotConfigured => "not-configured",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::GeneralError => "general-error",
        }
    }
}

/// A structured Kairo error that can live inside `anyhow::Error`.
#[derive(Debug)]
pub struct KairoError {
    pub kind: ErrorKind,
    pub message: String,
    pub source: Option<AnyError>,
}

impl KairoError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Convert into `anyhow::Error` so it flows through store and handler traits.
    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// Downcast an `anyhow::Error` to a `KairoError` if possible.
    pub fn from_anyhow(err: &AnyError) -> Option<&KairoError> {
        err.downcast_ref::<KairoError>()
    }

    /// Turn any error into a KairoError:
    /// - if it's already a KairoError, keep it (lossless)
    /// - otherwise wrap as GeneralError
    pub fn normalize(err: AnyError) -> KairoError {
        match err.downcast::<KairoError>() {
            Ok(kairo) => kairo,
            Err(other) => KairoError::new(ErrorKind::GeneralError, other.to_string()).with_source(other),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }
    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unprocessable, msg)
    }
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotConfigured, msg)
    }
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, msg)
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
}

impl fmt::Display for KairoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message)
    }
}

impl std::error::Error for KairoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Bail out of an `anyhow`-returning function with a KairoError.
#[macro_export]
macro_rules! bail_kairo {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::KairoError::$ctor($msg).into_anyhow());
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::KairoError::$ctor(format!($fmt, $($arg)*)).into_anyhow());
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejects(flag: bool) -> KairoResult<()> {
        if flag {
            bail_kairo!(conflict, "tenant {} is pending", 42);
        }
        Ok(())
    }

    #[test]
    fn kind_survives_anyhow_round_trip() {
        let err = rejects(true).unwrap_err();
        let kairo = KairoError::from_anyhow(&err).expect("structured error");
        assert_eq!(kairo.kind, ErrorKind::Conflict);
        assert_eq!(kairo.to_string(), "Conflict: tenant 42 is pending");
        assert!(rejects(false).is_ok());
    }

    #[test]
    fn normalize_wraps_foreign_errors() {
        let foreign = anyhow::anyhow!("disk full");
        let normalized = KairoError::normalize(foreign);
        assert_eq!(normalized.kind, ErrorKind::GeneralError);
        assert_eq!(normalized.class_name(), "general-error");
        assert!(std::error::Error::source(&normalized).is_some());
    }
}
