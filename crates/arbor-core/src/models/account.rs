//! Account domain model.
//!
//! Accounts form the tenancy tree of the backup platform: a root
//! account for the customer organization, with subsidiaries, divisions,
//! locations, and franchises nested below it. Each node carries its own
//! settings, billing, and usage counters; billing and permissions are
//! resolved up the ancestor chain by `arbor-engine`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ArborError, ArborResult};

/// Position of an account in the tenancy tree.
///
/// The type constrains which types are legal as direct children; see
/// [`AccountType::allows_child`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Root,
    Subsidiary,
    Division,
    Location,
    Franchise,
}

impl AccountType {
    /// Legal direct-child types for this account type.
    ///
    /// Locations are the lowest tier and admit no children at all;
    /// every other non-root tier bottoms out at `Location`.
    pub fn allowed_child_types(self) -> &'static [AccountType] {
        match self {
            Self::Root => &[Self::Subsidiary, Self::Division],
            Self::Subsidiary => &[Self::Division, Self::Location],
            Self::Division => &[Self::Location],
            Self::Franchise => &[Self::Location],
            Self::Location => &[],
        }
    }

    pub fn allows_child(self, child: AccountType) -> bool {
        self.allowed_child_types().contains(&child)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Subsidiary => "subsidiary",
            Self::Division => "division",
            Self::Location => "location",
            Self::Franchise => "franchise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "root" => Some(Self::Root),
            "subsidiary" => Some(Self::Subsidiary),
            "division" => Some(Self::Division),
            "location" => Some(Self::Location),
            "franchise" => Some(Self::Franchise),
            _ => None,
        }
    }
}

/// Per-account structural settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSettings {
    /// Whether sub-accounts may be created under this account.
    pub allow_sub_accounts: bool,
    /// Ceiling on the number of direct children.
    pub max_sub_accounts: u32,
    /// IANA timezone name; children inherit it at creation time.
    pub timezone: String,
}

/// Billing status of an account.
///
/// `Inherited` means the effective billing is resolved from the nearest
/// ancestor whose status is not `Inherited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingStatus {
    Active,
    Inherited,
    Suspended,
    Free,
}

impl BillingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inherited => "inherited",
            Self::Suspended => "suspended",
            Self::Free => "free",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "inherited" => Some(Self::Inherited),
            "suspended" => Some(Self::Suspended),
            "free" => Some(Self::Free),
            _ => None,
        }
    }
}

/// Plan limits attached to a billing plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub storage_bytes: u64,
    pub source_count: u32,
    pub job_count: u32,
}

/// Billing information for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub status: BillingStatus,
    pub plan: String,
    pub limits: PlanLimits,
}

impl BillingInfo {
    /// Billing carried by new sub-accounts unless overridden.
    pub fn inherited() -> Self {
        Self {
            status: BillingStatus::Inherited,
            plan: String::new(),
            limits: PlanLimits::default(),
        }
    }

    /// System-wide fallback plan: every account resolves to *some*
    /// effective plan even when no ancestor carries one.
    pub fn default_free(plan: impl Into<String>) -> Self {
        Self {
            status: BillingStatus::Free,
            plan: plan.into(),
            limits: PlanLimits::default(),
        }
    }
}

/// Resource-usage counters owned by a single account.
///
/// These are never pre-aggregated with descendants; subtree roll-ups
/// are computed on demand by the usage aggregator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub storage_bytes: u64,
    pub source_count: u64,
    pub job_count: u64,
    pub api_calls: u64,
}

/// A node in the tenancy tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// `None` only for root accounts.
    pub parent_id: Option<Uuid>,
    /// Human-readable name.
    pub name: String,
    pub company: Option<String>,
    pub description: Option<String>,
    /// URL-safe path segment, unique among siblings (e.g. `division-a`).
    pub slug: String,
    /// Materialized path of slugs from root to this node
    /// (e.g. `acme/division-a/location-3`).
    pub account_path: String,
    /// Depth in the tree; root = 0, always `parent.level + 1`.
    pub level: u32,
    pub account_type: AccountType,
    pub settings: AccountSettings,
    pub billing: BillingInfo,
    pub usage: UsageCounters,
    /// Optimistic-concurrency token; bumped on every compare-and-swap
    /// update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Fully-computed record handed to the account store for insertion.
///
/// Path, level, and defaults are resolved by the hierarchy resolver
/// before this reaches storage; the store only assigns the id and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub company: Option<String>,
    pub description: Option<String>,
    pub slug: String,
    pub account_path: String,
    pub level: u32,
    pub account_type: AccountType,
    pub settings: AccountSettings,
    pub billing: BillingInfo,
}

/// Fields for creating a standalone root account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRootAccount {
    pub name: String,
    pub company: Option<String>,
    pub description: Option<String>,
    pub slug: String,
    pub settings: SettingsOverrides,
    pub billing: Option<BillingInfo>,
}

/// Fields for creating a sub-account under an existing parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubAccount {
    pub name: String,
    pub company: Option<String>,
    pub description: Option<String>,
    pub slug: String,
    pub account_type: AccountType,
    pub settings: SettingsOverrides,
    /// Defaults to `inherited` when absent.
    pub billing: Option<BillingInfo>,
}

/// Optional per-field settings overrides applied on creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsOverrides {
    pub allow_sub_accounts: Option<bool>,
    pub max_sub_accounts: Option<u32>,
    /// Defaults to the parent's timezone when absent.
    pub timezone: Option<String>,
}

/// Fields that can be updated on an existing account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccount {
    pub name: Option<String>,
    pub company: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub settings: Option<AccountSettings>,
    pub billing: Option<BillingInfo>,
}

/// A single recomputed materialized path, applied transactionally with
/// the rename that caused it.
#[derive(Debug, Clone)]
pub struct PathUpdate {
    pub id: Uuid,
    pub account_path: String,
}

/// Validate a path slug: lowercase alphanumerics and `-`, non-empty,
/// no leading or trailing `-`.
pub fn validate_slug(slug: &str) -> ArborResult<()> {
    let ok = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ArborError::Validation {
            message: format!("invalid slug: {slug:?}"),
        })
    }
}

/// Join a parent's materialized path with a child slug.
pub fn child_path(parent_path: &str, slug: &str) -> String {
    format!("{parent_path}/{slug}")
}
