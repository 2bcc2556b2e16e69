//! ARBOR Engine — the account-hierarchy engine.
//!
//! Four components, composed over the `arbor-core` traits:
//! - [`HierarchyResolver`]: tree structure, sub-account creation,
//!   rename path cascades, cascading deletes.
//! - [`PermissionResolver`]: effective capability sets via
//!   nearest-ancestor-wins resolution.
//! - [`UsageAggregator`]: subtree usage roll-ups and effective billing.
//! - [`AccountContextManager`]: per-session active-account state.
//!
//! The engine is generic over the account store and grant store so it
//! carries no database dependency of its own.

pub mod config;
pub mod context;
pub mod hierarchy;
pub mod permission;
pub mod usage;

pub use config::EngineConfig;
pub use context::AccountContextManager;
pub use hierarchy::{AccountTree, HierarchyResolver};
pub use permission::PermissionResolver;
pub use usage::{UsageAggregator, UsageSummary};
