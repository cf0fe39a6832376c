//! Error types for the custody ledger

use crate::host::TransferError;
use crate::types::{Principal, TrustId, TrustStatus};
use thiserror::Error;

/// Result type for custody operations
pub type Result<T> = std::result::Result<T, Error>;

/// Custody errors
#[derive(Error, Debug)]
pub enum Error {
    /// Caller is not allowed to perform the operation
    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized {
        /// Rejected caller
        caller: Principal,
        /// Attempted action
        action: &'static str,
    },

    /// Unknown record id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Zero/empty/self-referential argument or bound violation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Release or cancel on a non-active or exhausted trust
    #[error("Trust {id} is {status} and cannot be changed")]
    AlreadyTerminal {
        /// Trust ID
        id: TrustId,
        /// Status at call time
        status: TrustStatus,
    },

    /// Lifecycle edge outside the allowed set
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: TrustStatus,
        /// Requested status
        to: TrustStatus,
    },

    /// Operation requires the trust to be unexpired
    #[error("Trust {0} has expired")]
    Expired(TrustId),

    /// Operation requires the trust to be expired
    #[error("Trust {0} has not expired yet")]
    NotYetExpired(TrustId),

    /// Host transfer primitive declined
    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    /// Too many split beneficiaries
    #[error("Too many recipients: {count} (max {max})")]
    TooManyRecipients {
        /// Supplied count
        count: usize,
        /// Configured bound
        max: usize,
    },

    /// Split shares do not sum to 100
    #[error("Distribution invalid: shares sum to {0}, expected 100")]
    DistributionInvalid(u64),

    /// Grantor exceeded creations per rate window
    #[error("Rate exceeded for {0}")]
    RateExceeded(Principal),

    /// High-value creation after consecutive actions
    #[error("Suspicious pattern for {0}")]
    SuspiciousPattern(Principal),

    /// Audit already recorded for trust
    #[error("Audit already exists for trust {0}")]
    AuditExists(TrustId),

    /// Platform frozen by admin
    #[error("Platform is frozen")]
    PlatformFrozen,

    /// Recipient not on the approval allow-list
    #[error("Recipient not approved: {0}")]
    RecipientNotApproved(Principal),

    /// Storage error (backend)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (custody accounting, rollback failure)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized { .. } => "unauthorized",
            Error::NotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::AlreadyTerminal { .. } => "already_terminal",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::Expired(_) => "expired",
            Error::NotYetExpired(_) => "not_yet_expired",
            Error::TransferFailed(_) => "transfer_failed",
            Error::TooManyRecipients { .. } => "too_many_recipients",
            Error::DistributionInvalid(_) => "distribution_invalid",
            Error::RateExceeded(_) => "rate_exceeded",
            Error::SuspiciousPattern(_) => "suspicious_pattern",
            Error::AuditExists(_) => "audit_exists",
            Error::PlatformFrozen => "platform_frozen",
            Error::RecipientNotApproved(_) => "recipient_not_approved",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }

    pub(crate) fn unauthorized(caller: &Principal, action: &'static str) -> Self {
        Error::Unauthorized {
            caller: caller.clone(),
            action,
        }
    }
}

#[cfg(feature = "rocksdb")]
impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
