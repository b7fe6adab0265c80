//! Error types for Concierge.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Onramp error: {0}")]
    Onramp(#[from] OnrampError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Task store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Task not found: {0}")]
    NotFound(uuid::Uuid),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM oracle errors (coordinate and size resolution).
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle request failed: {0}")]
    RequestFailed(String),

    #[error("Oracle returned an unusable answer: {0}")]
    InvalidAnswer(String),

    #[error("Oracle authentication failed")]
    AuthFailed,
}

/// Browser automation boundary errors.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser agent request failed: {0}")]
    AgentUnreachable(String),

    #[error("Browser step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("No farmed session available for {provider}")]
    NoSession { provider: String },

    #[error("Session file error: {0}")]
    SessionFile(String),
}

/// Payment-provider onramp errors.
#[derive(Debug, thiserror::Error)]
pub enum OnrampError {
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign request token: {0}")]
    Signing(String),

    #[error("Onramp session request failed: {0}")]
    RequestFailed(String),

    #[error("Onramp response missing {0}")]
    MissingField(&'static str),
}

/// Product search errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid search response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
