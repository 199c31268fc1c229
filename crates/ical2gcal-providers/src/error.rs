//! Error types shared by the feed fetcher and calendar destinations.
//!
//! Everything network-facing in this crate reports failures as a
//! [`ProviderError`]: a category code plus a message, optionally tagged
//! with the provider it came from and chained to a source error.

use std::fmt;
use thiserror::Error;

/// Coarse category for a [`ProviderError`].
///
/// Lets callers branch on the kind of failure without matching on
/// message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials are missing, invalid or expired.
    AuthenticationFailed,
    /// The authenticated user may not perform this operation.
    AuthorizationFailed,
    /// Transport failure: timeout, refused connection, DNS.
    NetworkError,
    /// The server asked us to slow down (429).
    RateLimited,
    /// The server failed on its side (5xx).
    ServerError,
    /// The response could not be parsed or had an unexpected shape.
    InvalidResponse,
    /// The calendar or event does not exist (404).
    NotFound,
    /// The server rejected the request as malformed (400).
    BadRequest,
    /// An event with this id is already stored (409).
    Conflict,
    /// The local configuration is incomplete or inconsistent.
    ConfigurationError,
    /// A bug or impossible state on our side.
    InternalError,
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Conflict => "conflict",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        };
        f.write_str(name)
    }
}

/// An error from fetching the feed or writing to a destination.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// Which provider produced the error ("google", "feed").
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Builds an error with an explicit code.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    /// An [`AuthenticationFailed`](ProviderErrorCode::AuthenticationFailed) error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// An [`AuthorizationFailed`](ProviderErrorCode::AuthorizationFailed) error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    /// A [`NetworkError`](ProviderErrorCode::NetworkError).
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// A [`RateLimited`](ProviderErrorCode::RateLimited) error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    /// A [`ServerError`](ProviderErrorCode::ServerError).
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// An [`InvalidResponse`](ProviderErrorCode::InvalidResponse) error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// A [`NotFound`](ProviderErrorCode::NotFound) error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    /// A [`BadRequest`](ProviderErrorCode::BadRequest) error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadRequest, message)
    }

    /// A [`Conflict`](ProviderErrorCode::Conflict) error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Conflict, message)
    }

    /// A [`ConfigurationError`](ProviderErrorCode::ConfigurationError).
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// An [`InternalError`](ProviderErrorCode::InternalError).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Tags the error with the provider it came from.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Chains the underlying cause onto the error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// True when a write was rejected because the id is already taken.
    /// The caller may retry the write as an update.
    pub fn is_conflict(&self) -> bool {
        self.code == ProviderErrorCode::Conflict
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
