//! Error types for recon-core.

use thiserror::Error;

/// Result type alias using recon-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transient network failure while issuing an outbound request.
    #[error("network error: {0}")]
    Network(String),

    /// A request did not complete within its deadline.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The advisor could not be reached (no credentials, connection failure).
    #[error("advisor unavailable: {0}")]
    AdvisorUnavailable(String),

    /// The advisor responded but a tool invocation failed schema validation.
    #[error("advisor protocol error: {0}")]
    AdvisorProtocolError(String),

    /// The configured advisor model does not meet the minimum capability tier.
    #[error("advisor model unsupported: {0}")]
    ModelUnsupported(String),

    /// A durable store operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// A mutation was requested against a target with no active DNA snapshot.
    #[error("no active DNA snapshot for target {target_id}")]
    NoActiveDna { target_id: String },

    /// A mutation proposal named a gene outside {identity, timing, network, interaction, capabilities}.
    #[error("unknown gene: {0}")]
    UnknownGene(String),

    /// A session already exists for this target.
    #[error("a crawl session is already running for target {target_id}")]
    AlreadyRunning { target_id: String },

    /// A core invariant was violated (missing active DNA, unrecognized enum value, etc).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Startup configuration error (invalid model name, unparseable proxy URL).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error that does not fit another category.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn advisor_unavailable(message: impl Into<String>) -> Self {
        Self::AdvisorUnavailable(message.into())
    }

    pub fn advisor_protocol_error(message: impl Into<String>) -> Self {
        Self::AdvisorProtocolError(message.into())
    }

    pub fn no_active_dna(target_id: impl Into<String>) -> Self {
        Self::NoActiveDna {
            target_id: target_id.into(),
        }
    }

    pub fn unknown_gene(gene: impl Into<String>) -> Self {
        Self::UnknownGene(gene.into())
    }

    pub fn already_running(target_id: impl Into<String>) -> Self {
        Self::AlreadyRunning {
            target_id: target_id.into(),
        }
    }

    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}
