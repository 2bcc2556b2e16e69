//! Error taxonomy for the ARBOR engine.
//!
//! Policy violations (`DepthExceeded`, `InvalidAccountType`,
//! `QuotaExceeded`, …) are surfaced to the caller unmodified and must
//! never be retried. `Conflict`, `StorageUnavailable`, and
//! `UpstreamUnavailable` are transient; retry policy belongs to the
//! caller, not the engine.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ArborError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Concurrent structural mutation: {message}")]
    Conflict { message: String },

    #[error("Sub-account quota exceeded on parent {parent_id} (max {max})")]
    QuotaExceeded { parent_id: Uuid, max: u32 },

    #[error("Maximum hierarchy depth exceeded (max {max})")]
    DepthExceeded { max: u32 },

    #[error("Account type {child} is not a legal child of {parent}")]
    InvalidAccountType { parent: String, child: String },

    #[error("Parent account {parent_id} does not allow sub-accounts")]
    ParentDisallowsSubAccounts { parent_id: Uuid },

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Account {account_id} is suspended")]
    AccountSuspended { account_id: Uuid },

    #[error("Account {account_id} has children; use force to cascade")]
    HasChildren { account_id: Uuid },

    #[error("Account {account_id} has active jobs running")]
    ActiveJobsRunning { account_id: Uuid },

    #[error("Upstream collaborator unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ArborResult<T> = Result<T, ArborError>;

impl ArborError {
    /// HTTP status the application layer should map this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. }
            | Self::QuotaExceeded { .. }
            | Self::HasChildren { .. }
            | Self::ActiveJobsRunning { .. } => 409,
            Self::AccessDenied { .. } | Self::AccountSuspended { .. } => 403,
            Self::DepthExceeded { .. }
            | Self::InvalidAccountType { .. }
            | Self::ParentDisallowsSubAccounts { .. }
            | Self::Validation { .. } => 400,
            Self::UpstreamUnavailable(_) | Self::StorageUnavailable(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Whether the caller may retry this error with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::UpstreamUnavailable(_) | Self::StorageUnavailable(_)
        )
    }
}
