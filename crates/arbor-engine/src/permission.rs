//! Permission resolution — effective capabilities for `(user, account)`.
//!
//! Capabilities resolve over the ancestor chain with nearest-wins
//! semantics per capability: an explicit grant (or revoke) on the
//! account itself beats one on its parent, and so on up to the root.
//! This models delegated administration — a division admin's explicit
//! override at their level takes precedence over inherited defaults —
//! while capabilities with no explicit entry anywhere fail closed.

use std::collections::{BTreeMap, HashMap};

use arbor_core::error::ArborResult;
use arbor_core::models::grant::{AccessGrant, Capability, CapabilitySet};
use arbor_core::repository::{AccountRepository, GrantStore};
use uuid::Uuid;

use crate::hierarchy::HierarchyResolver;

/// Computes effective capability sets by walking the hierarchy and
/// consulting the external grant store.
///
/// Read-only with respect to the account store; safe to call from any
/// number of concurrent requests.
#[derive(Clone)]
pub struct PermissionResolver<R, G>
where
    R: AccountRepository + Clone,
    G: GrantStore + Clone,
{
    hierarchy: HierarchyResolver<R>,
    grants: G,
}

impl<R, G> PermissionResolver<R, G>
where
    R: AccountRepository + Clone,
    G: GrantStore + Clone,
{
    pub fn new(hierarchy: HierarchyResolver<R>, grants: G) -> Self {
        Self { hierarchy, grants }
    }

    pub fn hierarchy(&self) -> &HierarchyResolver<R> {
        &self.hierarchy
    }

    /// Effective capability set for `(user, account)`.
    ///
    /// "No access" is the empty set, never an error; errors are
    /// reserved for a missing account or an unreachable grant store.
    pub async fn resolve(&self, user_id: Uuid, account_id: Uuid) -> ArborResult<CapabilitySet> {
        let (set, _) = self.resolve_with_direct(user_id, account_id).await?;
        Ok(set)
    }

    /// Whether the user may act as (select) the account.
    ///
    /// True iff the resolved set is non-empty, or the user holds an
    /// explicit grant directly on the account — a zero-capability
    /// grant still enumerates the user against the node (view-only
    /// selection is distinct from capability gating).
    pub async fn can_act_as(&self, user_id: Uuid, account_id: Uuid) -> ArborResult<bool> {
        let (set, has_direct_grant) = self.resolve_with_direct(user_id, account_id).await?;
        Ok(!set.is_empty() || has_direct_grant)
    }

    async fn resolve_with_direct(
        &self,
        user_id: Uuid,
        account_id: Uuid,
    ) -> ArborResult<(CapabilitySet, bool)> {
        // Nearest first: the account itself, then its parent, up to
        // the root. The chain is short (bounded depth), so a linear
        // scan is both correct and fast.
        let chain = self.hierarchy.ancestor_chain(account_id).await?;
        let chain_ids: Vec<Uuid> = chain.iter().map(|a| a.id).collect();

        let grants = self.grants.grants_for_accounts(user_id, &chain_ids).await?;
        let by_account: HashMap<Uuid, &AccessGrant> =
            grants.iter().map(|g| (g.account_id, g)).collect();

        let mut decided: BTreeMap<Capability, bool> = BTreeMap::new();
        for account in &chain {
            if let Some(grant) = by_account.get(&account.id) {
                for (&capability, &allowed) in &grant.capabilities {
                    // First (nearest) explicit entry wins; farther
                    // entries for the same capability are ignored.
                    decided.entry(capability).or_insert(allowed);
                }
            }
        }

        let set = decided
            .into_iter()
            .filter_map(|(capability, allowed)| allowed.then_some(capability))
            .collect();
        let has_direct_grant = by_account.contains_key(&account_id);

        Ok((set, has_direct_grant))
    }
}
