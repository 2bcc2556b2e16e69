//! Hierarchy resolution — tree structure enforcement and queries.
//!
//! The resolver is the single source of truth for traversal: ancestor
//! chains, subtrees, sub-account creation, rename path cascades, and
//! cascading deletes all go through it. Callers never re-derive
//! structure from flat lists.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arbor_core::error::{ArborError, ArborResult};
use arbor_core::models::account::{
    Account, AccountSettings, AccountType, BillingInfo, CreateRootAccount, CreateSubAccount,
    NewAccount, PathUpdate, UpdateAccount, child_path, validate_slug,
};
use arbor_core::repository::{AccountRepository, JobActivityProbe};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;

/// Iteration cap for the post-rename convergence sweep.
const RENAME_SWEEP_LIMIT: usize = 8;

/// A typed subtree snapshot. Children are ordered by creation time
/// (slug tiebreak), so repeated snapshots of an unchanged tree are
/// identical and safe for idempotent caching by callers.
#[derive(Debug, Clone)]
pub struct AccountTree {
    pub account: Account,
    pub children: Vec<AccountTree>,
}

impl AccountTree {
    /// Total number of nodes in this subtree, including the root.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(AccountTree::node_count).sum::<usize>()
    }

    /// Pre-order traversal of all accounts in the subtree.
    pub fn iter(&self) -> Vec<&Account> {
        let mut out = Vec::with_capacity(self.node_count());
        self.collect_pre_order(&mut out);
        out
    }

    fn collect_pre_order<'a>(&'a self, out: &mut Vec<&'a Account>) {
        out.push(&self.account);
        for child in &self.children {
            child.collect_pre_order(out);
        }
    }

    /// Account ids leaves-first; the order a cascading delete must use
    /// so the tree stays valid at every intermediate step.
    pub fn post_order_ids(&self) -> Vec<Uuid> {
        let mut out = Vec::with_capacity(self.node_count());
        self.collect_post_order(&mut out);
        out
    }

    fn collect_post_order(&self, out: &mut Vec<Uuid>) {
        for child in &self.children {
            child.collect_post_order(out);
        }
        out.push(self.account.id);
    }
}

/// Per-parent creation locks.
///
/// Sibling creation must serialize "read child count → validate →
/// write" per parent; the table is keyed by parent id so unrelated
/// parents never contend. Entries are tiny and never evicted.
#[derive(Default)]
struct ParentLocks {
    inner: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl ParentLocks {
    fn lock_for(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut table = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(table.entry(id).or_default())
    }
}

/// Enforces and queries the tenancy tree.
///
/// Clones share the per-parent lock registry, so every handle in a
/// process sees the same creation serialization.
#[derive(Clone)]
pub struct HierarchyResolver<R: AccountRepository + Clone> {
    repo: R,
    config: EngineConfig,
    locks: Arc<ParentLocks>,
}

impl<R: AccountRepository + Clone> HierarchyResolver<R> {
    pub fn new(repo: R, config: EngineConfig) -> Self {
        Self {
            repo,
            config,
            locks: Arc::new(ParentLocks::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Direct access to the underlying account store.
    pub fn store(&self) -> &R {
        &self.repo
    }

    pub async fn account(&self, id: Uuid) -> ArborResult<Account> {
        self.repo.get(id).await
    }

    /// The account itself, then its parent, up to the root.
    ///
    /// Bounded by the configured maximum depth; a longer chain means
    /// corrupt storage and is reported, never looped on.
    pub async fn ancestor_chain(&self, id: Uuid) -> ArborResult<Vec<Account>> {
        let mut chain = Vec::new();
        let mut current = Some(id);

        while let Some(current_id) = current {
            if chain.len() > self.config.max_depth as usize {
                return Err(ArborError::Internal(format!(
                    "ancestor chain of account {id} exceeds depth bound {}",
                    self.config.max_depth
                )));
            }
            let account = self.repo.get(current_id).await?;
            current = account.parent_id;
            chain.push(account);
        }

        Ok(chain)
    }

    /// Snapshot of the subtree rooted at `id`, built breadth-first.
    pub async fn subtree(&self, id: Uuid) -> ArborResult<AccountTree> {
        let root = self.repo.get(id).await?;

        // Fetch level by level, then assemble. Children arrive in
        // deterministic store order and assembly preserves it.
        let mut children_of: HashMap<Uuid, Vec<Account>> = HashMap::new();
        let mut frontier = vec![root.id];
        while let Some(node_id) = frontier.pop() {
            let children = self.repo.children_of(node_id).await?;
            frontier.extend(children.iter().map(|c| c.id));
            children_of.insert(node_id, children);
        }

        Ok(assemble(root, &mut children_of))
    }

    /// Create a standalone root account (level 0).
    pub async fn create_root_account(&self, input: CreateRootAccount) -> ArborResult<Account> {
        validate_slug(&input.slug)?;

        let settings = AccountSettings {
            allow_sub_accounts: input.settings.allow_sub_accounts.unwrap_or(true),
            max_sub_accounts: input
                .settings
                .max_sub_accounts
                .unwrap_or(self.config.default_max_sub_accounts),
            timezone: input
                .settings
                .timezone
                .unwrap_or_else(|| self.config.default_timezone.clone()),
        };
        let billing = input
            .billing
            .unwrap_or_else(|| BillingInfo::default_free(self.config.default_plan.clone()));

        let account = self
            .repo
            .create(NewAccount {
                parent_id: None,
                name: input.name,
                company: input.company,
                description: input.description,
                account_path: input.slug.clone(),
                slug: input.slug,
                level: 0,
                account_type: AccountType::Root,
                settings,
                billing,
            })
            .await?;

        info!(account_id = %account.id, slug = %account.slug, "Created root account");
        Ok(account)
    }

    /// Create a sub-account under `parent_id`.
    ///
    /// Holds the parent's creation lock across "read child count →
    /// validate → write", so concurrent sibling creation can neither
    /// exceed `max_sub_accounts` nor collide on slugs. The write
    /// itself is a single atomic store commit; cancellation leaves no
    /// partial child.
    pub async fn create_sub_account(
        &self,
        parent_id: Uuid,
        input: CreateSubAccount,
    ) -> ArborResult<Account> {
        validate_slug(&input.slug)?;

        let lock = self.locks.lock_for(parent_id);
        let _guard = lock.lock().await;

        let parent = self.repo.get(parent_id).await?;

        // Type legality first: a structurally impossible child is
        // always InvalidAccountType, regardless of parent settings.
        if !parent.account_type.allows_child(input.account_type) {
            return Err(ArborError::InvalidAccountType {
                parent: parent.account_type.as_str().into(),
                child: input.account_type.as_str().into(),
            });
        }
        if !parent.settings.allow_sub_accounts {
            return Err(ArborError::ParentDisallowsSubAccounts { parent_id });
        }
        let level = parent.level + 1;
        if level > self.config.max_depth {
            return Err(ArborError::DepthExceeded {
                max: self.config.max_depth,
            });
        }
        let child_count = self.repo.count_children(parent_id).await?;
        if child_count >= u64::from(parent.settings.max_sub_accounts) {
            return Err(ArborError::QuotaExceeded {
                parent_id,
                max: parent.settings.max_sub_accounts,
            });
        }

        let settings = AccountSettings {
            // Locations are the lowest tier; they stay closed unless
            // explicitly opened.
            allow_sub_accounts: input
                .settings
                .allow_sub_accounts
                .unwrap_or(input.account_type != AccountType::Location),
            max_sub_accounts: input
                .settings
                .max_sub_accounts
                .unwrap_or(self.config.default_max_sub_accounts),
            timezone: input
                .settings
                .timezone
                .unwrap_or_else(|| parent.settings.timezone.clone()),
        };
        let billing = input.billing.unwrap_or_else(BillingInfo::inherited);

        let account = self
            .repo
            .create(NewAccount {
                parent_id: Some(parent_id),
                name: input.name,
                company: input.company,
                description: input.description,
                account_path: child_path(&parent.account_path, &input.slug),
                slug: input.slug,
                level,
                account_type: input.account_type,
                settings,
                billing,
            })
            .await?;

        info!(
            account_id = %account.id,
            parent_id = %parent_id,
            account_path = %account.account_path,
            level = account.level,
            "Created sub-account"
        );
        Ok(account)
    }

    /// Compare-and-swap update of name/company/description/settings/
    /// billing. Structural fields (parent, slug, path, level) are not
    /// patchable; renames go through [`Self::rename_account`].
    pub async fn update_account(
        &self,
        id: Uuid,
        expected_version: u64,
        patch: UpdateAccount,
    ) -> ArborResult<Account> {
        self.repo.update(id, expected_version, patch).await
    }

    /// Change an account's slug, eagerly recomputing the materialized
    /// paths of its entire subtree.
    ///
    /// The slug change and every descendant path commit in one store
    /// transaction, so readers never observe a child path inconsistent
    /// with its parent's. A convergence sweep afterwards repairs any
    /// child committed concurrently with the rename under the old
    /// prefix.
    pub async fn rename_account(&self, id: Uuid, new_slug: String) -> ArborResult<Account> {
        validate_slug(&new_slug)?;

        // Block direct-child creation under the renamed node while the
        // subtree snapshot and path rewrite are in flight.
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        let tree = self.subtree(id).await?;
        let old = &tree.account;
        if old.slug == new_slug {
            return Ok(old.clone());
        }

        let old_path = old.account_path.clone();
        let new_path = match old.parent_id {
            Some(_) => match old_path.rfind('/') {
                Some(idx) => format!("{}/{new_slug}", &old_path[..idx]),
                None => {
                    return Err(ArborError::Internal(format!(
                        "account {id} has a parent but a rootless path {old_path:?}"
                    )));
                }
            },
            None => new_slug.clone(),
        };

        let path_updates = tree
            .iter()
            .into_iter()
            .map(|account| PathUpdate {
                id: account.id,
                account_path: rebase_path(&account.account_path, &old_path, &new_path),
            })
            .collect();

        let renamed = self
            .repo
            .rename(id, old.version, new_slug, path_updates)
            .await?;

        self.sweep_stale_paths(&old_path, &new_path).await?;

        info!(
            account_id = %id,
            old_path = %old_path,
            new_path = %new_path,
            "Renamed account and recomputed subtree paths"
        );
        Ok(renamed)
    }

    /// Repair descendants that were committed under the old prefix
    /// concurrently with a rename. At-least-once: each pass is
    /// transactional and the scan re-runs until clean.
    async fn sweep_stale_paths(&self, old_path: &str, new_path: &str) -> ArborResult<()> {
        let stale_prefix = format!("{old_path}/");
        for _ in 0..RENAME_SWEEP_LIMIT {
            let stale = self.repo.list_by_path_prefix(&stale_prefix).await?;
            if stale.is_empty() {
                return Ok(());
            }
            warn!(
                count = stale.len(),
                old_path, "Repairing paths committed during rename"
            );
            let updates = stale
                .iter()
                .map(|account| PathUpdate {
                    id: account.id,
                    account_path: rebase_path(&account.account_path, old_path, new_path),
                })
                .collect();
            self.repo.update_paths(updates).await?;
        }
        Err(ArborError::Conflict {
            message: format!("subtree paths under {old_path:?} did not converge after rename"),
        })
    }

    /// Delete an account.
    ///
    /// Without `force`, fails with `HasChildren` if any children exist
    /// and `ActiveJobsRunning` if the job probe reports activity. With
    /// `force`, deletes the whole subtree bottom-up (leaves first) so
    /// the tree is valid at every intermediate step; the first failure
    /// aborts with ancestors intact. Already-deleted leaves are not
    /// resurrected — the cleanup is at-least-once over idempotent
    /// deletes.
    pub async fn delete_account<J: JobActivityProbe>(
        &self,
        id: Uuid,
        force: bool,
        jobs: &J,
    ) -> ArborResult<()> {
        let lock = self.locks.lock_for(id);
        let _guard = lock.lock().await;

        // Existence check; missing accounts surface NotFound rather
        // than silently succeeding.
        self.repo.get(id).await?;

        if !force {
            let child_count = self.repo.count_children(id).await?;
            if child_count > 0 {
                return Err(ArborError::HasChildren { account_id: id });
            }
            if jobs.has_active_jobs(id).await? {
                return Err(ArborError::ActiveJobsRunning { account_id: id });
            }
            self.repo.delete(id).await?;
            info!(account_id = %id, "Deleted account");
            return Ok(());
        }

        let tree = self.subtree(id).await?;
        let order = tree.post_order_ids();
        let total = order.len();
        for node_id in order {
            self.repo.delete(node_id).await?;
        }
        info!(account_id = %id, deleted = total, "Force-deleted account subtree");
        Ok(())
    }
}

/// Rewrite `path` so its `old_prefix` becomes `new_prefix`.
fn rebase_path(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    match path.strip_prefix(old_prefix) {
        Some(rest) => format!("{new_prefix}{rest}"),
        // Not under the renamed subtree; leave untouched.
        None => path.to_string(),
    }
}

fn assemble(account: Account, children_of: &mut HashMap<Uuid, Vec<Account>>) -> AccountTree {
    let children = children_of
        .remove(&account.id)
        .unwrap_or_default()
        .into_iter()
        .map(|child| assemble(child, children_of))
        .collect();
    AccountTree { account, children }
}
