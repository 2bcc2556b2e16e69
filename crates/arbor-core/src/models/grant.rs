//! Access grant domain model.
//!
//! Grants live in an external Access Grant Store; the engine only
//! consumes them. A grant associates a user with exactly one account
//! and a set of explicitly-valued capabilities. Grants never apply
//! implicitly to siblings or ancestors of the account they name;
//! inheritance to *descendants* is computed at resolution time by the
//! permission resolver (nearest explicit entry wins per capability).

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named permission a user can hold on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    CanChangeSettings,
    CanManageBilling,
    CanDeleteAccount,
    CanCreateSubAccounts,
    CanManageGrants,
    CanViewUsage,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CanChangeSettings => "canChangeSettings",
            Self::CanManageBilling => "canManageBilling",
            Self::CanDeleteAccount => "canDeleteAccount",
            Self::CanCreateSubAccounts => "canCreateSubAccounts",
            Self::CanManageGrants => "canManageGrants",
            Self::CanViewUsage => "canViewUsage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "canChangeSettings" => Some(Self::CanChangeSettings),
            "canManageBilling" => Some(Self::CanManageBilling),
            "canDeleteAccount" => Some(Self::CanDeleteAccount),
            "canCreateSubAccounts" => Some(Self::CanCreateSubAccounts),
            "canManageGrants" => Some(Self::CanManageGrants),
            "canViewUsage" => Some(Self::CanViewUsage),
            _ => None,
        }
    }
}

/// An explicit association of a user with an account.
///
/// `capabilities` maps each named capability to an explicit boolean; an
/// absent entry means "no opinion at this level" and resolution keeps
/// walking up the chain. A grant with an empty map still enumerates the
/// user against the account (view-only selection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrant {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub capabilities: BTreeMap<Capability, bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to record a new grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccessGrant {
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub capabilities: BTreeMap<Capability, bool>,
}

/// The set of capabilities that resolved to `true` for a
/// `(user, account)` pair.
///
/// An empty set is the fail-closed default, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0.insert(capability);
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
