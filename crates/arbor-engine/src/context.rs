//! Session account-context management.
//!
//! Tracks which account each session is acting as. Switches are
//! validated against the permission resolver and the target's
//! effective billing; the replacement itself is atomic, so no reader
//! of the session ever observes an intermediate state. Sessions are
//! logically single-actor, so concurrent switches simply last-write-
//! win — the manager never caches capability sets across a switch.

use std::collections::HashMap;
use std::sync::Arc;

use arbor_core::error::{ArborError, ArborResult};
use arbor_core::models::account::BillingStatus;
use arbor_core::models::context::{AccountContext, SessionId};
use arbor_core::repository::{AccountRepository, GrantStore};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::permission::PermissionResolver;
use crate::usage::UsageAggregator;

/// Lifecycle of a session: `Unselected → Active(a) → Active(b) → …
/// → Ended`.
#[derive(Debug, Clone)]
enum SessionState {
    Unselected { user_id: Uuid },
    Active(AccountContext),
    Ended,
}

/// Tracks the active account per session and validates switches.
#[derive(Clone)]
pub struct AccountContextManager<R, G>
where
    R: AccountRepository + Clone,
    G: GrantStore + Clone,
{
    permissions: PermissionResolver<R, G>,
    usage: UsageAggregator<R>,
    sessions: Arc<RwLock<HashMap<SessionId, SessionState>>>,
}

impl<R, G> AccountContextManager<R, G>
where
    R: AccountRepository + Clone,
    G: GrantStore + Clone,
{
    pub fn new(permissions: PermissionResolver<R, G>, usage: UsageAggregator<R>) -> Self {
        Self {
            permissions,
            usage,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open a session for a user with no account selected yet.
    pub async fn begin(&self, user_id: Uuid) -> SessionId {
        let session_id = SessionId::generate();
        self.sessions
            .write()
            .await
            .insert(session_id, SessionState::Unselected { user_id });
        session_id
    }

    /// Switch the session to act as `target_account_id`.
    ///
    /// Validates that the session's user can act as the target and
    /// that the target's effective billing is not suspended, then
    /// atomically replaces the active account. Subsequent operations
    /// must re-derive capabilities against the new active account.
    pub async fn switch(
        &self,
        session_id: SessionId,
        target_account_id: Uuid,
    ) -> ArborResult<AccountContext> {
        let user_id = self.session_user(session_id).await?;

        // Validation happens outside the session lock; the store
        // lookups are suspension points and must not block readers.
        if !self
            .permissions
            .can_act_as(user_id, target_account_id)
            .await?
        {
            return Err(ArborError::AccessDenied {
                reason: format!("user {user_id} holds no grant on account {target_account_id} or its ancestors"),
            });
        }

        let billing = self.usage.effective_billing(target_account_id).await?;
        if billing.status == BillingStatus::Suspended {
            return Err(ArborError::AccountSuspended {
                account_id: target_account_id,
            });
        }

        let context = AccountContext {
            user_id,
            active_account_id: target_account_id,
        };

        let mut sessions = self.sessions.write().await;
        match sessions.get(&session_id) {
            // Session ended while we were validating; do not revive it.
            Some(SessionState::Ended) => Err(ArborError::Validation {
                message: format!("session {} has ended", session_id.0),
            }),
            Some(_) => {
                sessions.insert(session_id, SessionState::Active(context));
                info!(
                    session_id = %session_id.0,
                    user_id = %user_id,
                    account_id = %target_account_id,
                    "Switched account context"
                );
                Ok(context)
            }
            None => Err(ArborError::NotFound {
                entity: "session".into(),
                id: session_id.0.to_string(),
            }),
        }
    }

    /// The session's current context, if an account is selected.
    pub async fn active_context(&self, session_id: SessionId) -> Option<AccountContext> {
        match self.sessions.read().await.get(&session_id) {
            Some(SessionState::Active(context)) => Some(*context),
            _ => None,
        }
    }

    /// End a session; later switches on it fail.
    pub async fn end(&self, session_id: SessionId) {
        if let Some(state) = self.sessions.write().await.get_mut(&session_id) {
            *state = SessionState::Ended;
        }
    }

    async fn session_user(&self, session_id: SessionId) -> ArborResult<Uuid> {
        match self.sessions.read().await.get(&session_id) {
            Some(SessionState::Unselected { user_id }) => Ok(*user_id),
            Some(SessionState::Active(context)) => Ok(context.user_id),
            Some(SessionState::Ended) => Err(ArborError::Validation {
                message: format!("session {} has ended", session_id.0),
            }),
            None => Err(ArborError::NotFound {
                entity: "session".into(),
                id: session_id.0.to_string(),
            }),
        }
    }
}
