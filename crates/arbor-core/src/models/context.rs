//! Session account-context model.
//!
//! A context is ephemeral, per-session state; it is never persisted and
//! is revalidated on every account-sensitive operation. Capability sets
//! are never cached across a switch.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// The account a session is currently acting as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
    pub user_id: Uuid,
    pub active_account_id: Uuid,
}
