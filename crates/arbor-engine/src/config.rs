//! Engine configuration.

/// Configuration for the account-hierarchy engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum tree depth; root accounts are level 0 and no account
    /// may exceed this level (default: 5).
    pub max_depth: u32,
    /// Ceiling on direct children applied to new accounts that do not
    /// override it (default: 25).
    pub default_max_sub_accounts: u32,
    /// Plan name used when billing inheritance resolves to nothing
    /// (default: `free`).
    pub default_plan: String,
    /// Timezone assigned to new root accounts (default: `UTC`);
    /// sub-accounts inherit their parent's timezone instead.
    pub default_timezone: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            default_max_sub_accounts: 25,
            default_plan: "free".into(),
            default_timezone: "UTC".into(),
        }
    }
}
