//! Usage aggregation and effective-billing resolution.
//!
//! Roll-ups are best-effort snapshots: aggregation is deliberately not
//! transactional against concurrent usage updates elsewhere in the
//! system, and callers must treat the numbers as approximate. This is
//! the documented consistency model, not a bug.

use arbor_core::error::ArborResult;
use arbor_core::models::account::{BillingInfo, BillingStatus};
use arbor_core::repository::AccountRepository;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hierarchy::HierarchyResolver;

/// Usage counters summed over an account and all of its descendants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub storage_bytes: u64,
    pub source_count: u64,
    pub job_count: u64,
    pub api_calls: u64,
    pub descendant_count: u64,
}

/// Rolls up resource usage across subtrees and resolves inherited
/// billing. Read-only with respect to the account store.
#[derive(Clone)]
pub struct UsageAggregator<R: AccountRepository + Clone> {
    hierarchy: HierarchyResolver<R>,
}

impl<R: AccountRepository + Clone> UsageAggregator<R> {
    pub fn new(hierarchy: HierarchyResolver<R>) -> Self {
        Self { hierarchy }
    }

    /// Sum the account's own counters with those of every descendant.
    ///
    /// The descendants come from a single materialized-path prefix
    /// scan; the account's own counters are added once (the prefix
    /// scan excludes the node itself, so nothing is double counted).
    pub async fn aggregate(&self, account_id: Uuid) -> ArborResult<UsageSummary> {
        let account = self.hierarchy.account(account_id).await?;
        let descendants = self
            .hierarchy
            .store()
            .list_by_path_prefix(&format!("{}/", account.account_path))
            .await?;

        let mut summary = UsageSummary {
            storage_bytes: account.usage.storage_bytes,
            source_count: account.usage.source_count,
            job_count: account.usage.job_count,
            api_calls: account.usage.api_calls,
            descendant_count: descendants.len() as u64,
        };
        for descendant in &descendants {
            summary.storage_bytes += descendant.usage.storage_bytes;
            summary.source_count += descendant.usage.source_count;
            summary.job_count += descendant.usage.job_count;
            summary.api_calls += descendant.usage.api_calls;
        }

        Ok(summary)
    }

    /// The billing actually applied to an account.
    ///
    /// `inherited` status resolves to the nearest ancestor whose
    /// status is not `inherited`; when no such ancestor exists the
    /// system-wide default free plan applies. Every account therefore
    /// has an effective plan — this never errors for "nothing found".
    pub async fn effective_billing(&self, account_id: Uuid) -> ArborResult<BillingInfo> {
        let account = self.hierarchy.account(account_id).await?;
        if account.billing.status != BillingStatus::Inherited {
            return Ok(account.billing);
        }

        let chain = self.hierarchy.ancestor_chain(account_id).await?;
        for ancestor in chain.into_iter().skip(1) {
            if ancestor.billing.status != BillingStatus::Inherited {
                return Ok(ancestor.billing);
            }
        }

        Ok(BillingInfo::default_free(
            self.hierarchy.config().default_plan.clone(),
        ))
    }
}
