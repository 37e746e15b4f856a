//!
//! src/errors.rs
//!
//! Defines the error taxonomy surfaced to callers of the catalog and the
//! store-level errors the resolver inspects
//!

use thiserror::Error;

/// Every failure that reaches a caller is exactly one of these kinds.
/// `Config` and `Io` only occur during startup.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller-facing classification of a `CatalogError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthenticated,
    NotFound,
    InvalidMetadata,
    UpstreamUnavailable,
    InternalError,
}

impl ErrorKind {
    /// Structured code attached to transport errors
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest          => "BAD_REQUEST",
            ErrorKind::Unauthenticated     => "UNAUTHENTICATED",
            ErrorKind::NotFound            => "NOT_FOUND",
            ErrorKind::InvalidMetadata     => "NOT_ACCEPTABLE",
            ErrorKind::UpstreamUnavailable => "GATEWAY_TIMEOUT",
            ErrorKind::InternalError       => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(self) -> u16 {
        match self {
            ErrorKind::BadRequest          => 400,
            ErrorKind::Unauthenticated     => 401,
            ErrorKind::NotFound            => 404,
            ErrorKind::InvalidMetadata     => 406,
            ErrorKind::UpstreamUnavailable => 504,
            ErrorKind::InternalError       => 500,
        }
    }
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::BadRequest(_)          => ErrorKind::BadRequest,
            CatalogError::Unauthenticated(_)     => ErrorKind::Unauthenticated,
            CatalogError::NotFound(_)            => ErrorKind::NotFound,
            CatalogError::InvalidMetadata(_)     => ErrorKind::InvalidMetadata,
            CatalogError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            CatalogError::Internal(_)
            | CatalogError::Config(_)
            | CatalogError::Io(_)                => ErrorKind::InternalError,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Message safe to hand to a client; internal details stay in the logs
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::InternalError => "Internal server error".to_string(),
            ErrorKind::UpstreamUnavailable =>
                "No response from metadata provider".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Errors raised by a catalog store. `Conflict` is a uniqueness violation,
/// which the resolver treats as "record now exists".
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("db error: {0}")]
    Db(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
            _ => StoreError::Db(e.to_string()),
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(e: StoreError) -> Self { CatalogError::Internal(e.to_string()) }
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self { CatalogError::Internal(format!("db error: {e}")) }
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self { CatalogError::Internal(format!("json error: {e}")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_classify_as_internal() {
        let e = CatalogError::Config("ACR_CLOUD_API_KEY was not set".into());
        assert_eq!(e.kind(), ErrorKind::InternalError);
        assert_eq!(e.code(), "INTERNAL_SERVER_ERROR");
        assert_eq!(e.public_message(), "Internal server error");
    }

    #[test]
    fn store_errors_never_leak_as_conflict() {
        let e: CatalogError = StoreError::Conflict("tracks.isrc".into()).into();
        assert_eq!(e.kind(), ErrorKind::InternalError);
    }

    #[test]
    fn codes_match_transport_contract() {
        assert_eq!(CatalogError::NotFound("x".into()).code(), "NOT_FOUND");
        assert_eq!(CatalogError::InvalidMetadata("x".into()).code(), "NOT_ACCEPTABLE");
        assert_eq!(CatalogError::UpstreamUnavailable("x".into()).code(), "GATEWAY_TIMEOUT");
        assert_eq!(CatalogError::BadRequest("x".into()).kind().status(), 400);
        assert_eq!(CatalogError::Unauthenticated("x".into()).kind().status(), 401);
    }
}
