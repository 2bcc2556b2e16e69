//! Repository and collaborator trait definitions.
//!
//! All operations are async. The account store is the only shared
//! mutable resource in the system; the grant store and job probe are
//! external collaborators the engine consumes read-only.

use uuid::Uuid;

use crate::error::ArborResult;
use crate::models::account::{Account, NewAccount, PathUpdate, UpdateAccount, UsageCounters};
use crate::models::grant::AccessGrant;

/// Durable storage of account nodes (the Account Store).
///
/// Mutations on a given parent must be linearizable with respect to
/// that parent's child count and path-prefix assignment; the hierarchy
/// resolver additionally serializes sibling creation with a per-parent
/// lock, so implementations only need per-operation atomicity.
pub trait AccountRepository: Send + Sync {
    /// Insert a fully-computed record; assigns id and timestamps.
    /// All-or-nothing: a cancelled create leaves no partial node.
    fn create(&self, input: NewAccount) -> impl Future<Output = ArborResult<Account>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = ArborResult<Account>> + Send;

    /// Compare-and-swap update: fails with `Conflict` when the stored
    /// version no longer matches `expected_version`.
    fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        patch: UpdateAccount,
    ) -> impl Future<Output = ArborResult<Account>> + Send;

    /// Overwrite the account's own usage counters. Deliberately not
    /// versioned: counters are a best-effort snapshot fed by an
    /// external metrics pipeline.
    fn set_usage(
        &self,
        id: Uuid,
        usage: UsageCounters,
    ) -> impl Future<Output = ArborResult<()>> + Send;

    /// Change an account's slug and rewrite the materialized paths of
    /// its whole subtree in a single transaction, so no reader ever
    /// observes a child path inconsistent with its parent's.
    fn rename(
        &self,
        id: Uuid,
        expected_version: u64,
        new_slug: String,
        path_updates: Vec<PathUpdate>,
    ) -> impl Future<Output = ArborResult<Account>> + Send;

    /// Rewrite a batch of materialized paths in a single transaction.
    /// Used to converge stragglers created concurrently with a rename.
    fn update_paths(
        &self,
        path_updates: Vec<PathUpdate>,
    ) -> impl Future<Output = ArborResult<()>> + Send;

    /// Idempotent delete: removing a missing account succeeds.
    fn delete(&self, id: Uuid) -> impl Future<Output = ArborResult<()>> + Send;

    /// Direct children in deterministic order (creation time, then
    /// slug), so repeated traversals of an unchanged tree are
    /// identical.
    fn children_of(&self, id: Uuid) -> impl Future<Output = ArborResult<Vec<Account>>> + Send;

    fn count_children(&self, id: Uuid) -> impl Future<Output = ArborResult<u64>> + Send;

    /// All accounts whose materialized path starts with `prefix`.
    /// Used for subtree usage scans.
    fn list_by_path_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = ArborResult<Vec<Account>>> + Send;

    fn list_roots(&self) -> impl Future<Output = ArborResult<Vec<Account>>> + Send;
}

/// Read-only adapter to the external Access Grant Store.
pub trait GrantStore: Send + Sync {
    /// All grants the user holds on any of the given accounts.
    fn grants_for_accounts(
        &self,
        user_id: Uuid,
        account_ids: &[Uuid],
    ) -> impl Future<Output = ArborResult<Vec<AccessGrant>>> + Send;
}

/// External collaborator answering "does this account have backup jobs
/// running right now?". Consulted before non-forced deletion.
pub trait JobActivityProbe: Send + Sync {
    fn has_active_jobs(&self, account_id: Uuid) -> impl Future<Output = ArborResult<bool>> + Send;
}

/// Probe implementation for deployments without a job scheduler
/// attached (and for tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActiveJobs;

impl JobActivityProbe for NoActiveJobs {
    async fn has_active_jobs(&self, _account_id: Uuid) -> ArborResult<bool> {
        Ok(false)
    }
}
