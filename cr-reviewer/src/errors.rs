//! Crate-wide error hierarchy for cr-reviewer.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - Provider-aware mapping (401→Unauthorized, 429→RateLimited, 5xx→Server, etc.).
//! - No dynamic dispatch, no async-trait, ergonomic `?` via `From` impls.
//!
//! Propagation policy: parse failures abort the whole run (no partial parse
//! is trusted); review and posting failures are per-file and never cross the
//! orchestrator's file boundary.

use thiserror::Error;

use crate::git_providers::ProviderKind;

/// Convenient alias for crate-wide results.
pub type CrResult<T> = Result<T, Error>;

/// Root error type for the cr-reviewer crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider (GitHub/GitLab) fetch failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Unified diff parsing failure. Fatal to the run.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Comment posting failure (per-file; logged, run continues).
    #[error(transparent)]
    Post(#[from] PostError),

    /// LLM call failure.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Configuration problems (bad/missing tokens, base URL, etc.).
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Detailed provider-specific error used inside the fetch layer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited,

    /// Gateway/Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Other HTTP status (4xx/3xx) not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Unified diff parser errors.
///
/// A delimiter line the parser cannot split into old/new paths means a file
/// boundary was lost; silently skipping it would hide review-relevant files,
/// so the whole parse fails instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed file header line: {0}")]
    MalformedFileHeader(String),
}

/// A non-2xx response while posting a finding or updating the request.
#[derive(Debug, Error)]
#[error("{platform:?} post failed: status={status} body={body}")]
pub struct PostError {
    pub platform: ProviderKind,
    pub status: u16,
    pub body: String,
}

/// LLM transport/protocol errors. All of these count as `transport_error`
/// inside the per-file retry budget.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm http status error: {0}")]
    HttpStatus(u16),

    #[error("llm timeout")]
    Timeout,

    #[error("llm network error: {0}")]
    Network(String),

    #[error("llm response decode error: {0}")]
    Decode(String),
}

/// Configuration and setup errors (base API URL, missing token, etc.).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(ProviderError::from(e))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => ProviderError::Unauthorized,
                403 => ProviderError::Forbidden,
                404 => ProviderError::NotFound,
                429 => ProviderError::RateLimited,
                500..=599 => ProviderError::Server(code),
                _ => ProviderError::HttpStatus(code),
            };
        }
        ProviderError::Network(e.to_string())
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return LlmError::Timeout;
        }
        if let Some(status) = e.status() {
            return LlmError::HttpStatus(status.as_u16());
        }
        if e.is_decode() {
            return LlmError::Decode(e.to_string());
        }
        LlmError::Network(e.to_string())
    }
}
