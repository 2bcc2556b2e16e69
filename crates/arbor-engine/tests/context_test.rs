//! Integration tests for session account-context management: switch
//! validation, suspension gating, and session lifecycle.

use std::collections::BTreeMap;

use arbor_core::error::ArborError;
use arbor_core::models::account::{
    AccountType, BillingInfo, BillingStatus, CreateRootAccount, CreateSubAccount,
    SettingsOverrides,
};
use arbor_core::models::grant::{Capability, CreateAccessGrant};
use arbor_db::repository::{SurrealAccountRepository, SurrealGrantStore};
use arbor_engine::{
    AccountContextManager, EngineConfig, HierarchyResolver, PermissionResolver, UsageAggregator,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Harness {
    contexts: AccountContextManager<SurrealAccountRepository<Db>, SurrealGrantStore<Db>>,
    hierarchy: HierarchyResolver<SurrealAccountRepository<Db>>,
    grants: SurrealGrantStore<Db>,
}

async fn setup() -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    arbor_db::run_migrations(&db).await.unwrap();

    let accounts = SurrealAccountRepository::new(db.clone());
    let grants = SurrealGrantStore::new(db);
    let hierarchy = HierarchyResolver::new(accounts, EngineConfig::default());
    let permissions = PermissionResolver::new(hierarchy.clone(), grants.clone());
    let usage = UsageAggregator::new(hierarchy.clone());
    Harness {
        contexts: AccountContextManager::new(permissions, usage),
        hierarchy,
        grants,
    }
}

impl Harness {
    async fn root(&self, slug: &str, billing: Option<BillingInfo>) -> Uuid {
        self.hierarchy
            .create_root_account(CreateRootAccount {
                name: format!("Root {slug}"),
                company: None,
                description: None,
                slug: slug.into(),
                settings: SettingsOverrides::default(),
                billing,
            })
            .await
            .unwrap()
            .id
    }

    async fn child(&self, parent: Uuid, slug: &str) -> Uuid {
        self.hierarchy
            .create_sub_account(
                parent,
                CreateSubAccount {
                    name: format!("Sub {slug}"),
                    company: None,
                    description: None,
                    slug: slug.into(),
                    account_type: AccountType::Division,
                    settings: SettingsOverrides::default(),
                    billing: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn grant(&self, user: Uuid, account: Uuid, capability: Capability) {
        self.grants
            .put(CreateAccessGrant {
                user_id: user,
                account_id: account,
                capabilities: BTreeMap::from([(capability, true)]),
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn switch_to_granted_account_activates_it() {
    let h = setup().await;
    let user = Uuid::new_v4();
    let root = h.root("acme", None).await;
    h.grant(user, root, Capability::CanViewUsage).await;

    let session = h.contexts.begin(user).await;
    assert!(h.contexts.active_context(session).await.is_none());

    let context = h.contexts.switch(session, root).await.unwrap();
    assert_eq!(context.user_id, user);
    assert_eq!(context.active_account_id, root);

    let active = h.contexts.active_context(session).await.unwrap();
    assert_eq!(active.active_account_id, root);
}

#[tokio::test]
async fn inherited_grant_allows_switching_to_descendants() {
    let h = setup().await;
    let user = Uuid::new_v4();
    let root = h.root("acme", None).await;
    let division = h.child(root, "d1").await;
    h.grant(user, root, Capability::CanViewUsage).await;

    let session = h.contexts.begin(user).await;
    let context = h.contexts.switch(session, division).await.unwrap();
    assert_eq!(context.active_account_id, division);
}

#[tokio::test]
async fn switch_without_grant_is_denied() {
    let h = setup().await;
    let user = Uuid::new_v4();
    let root = h.root("acme", None).await;

    let session = h.contexts.begin(user).await;
    let result = h.contexts.switch(session, root).await;
    assert!(matches!(result, Err(ArborError::AccessDenied { .. })));
    assert!(h.contexts.active_context(session).await.is_none());
}

#[tokio::test]
async fn switch_to_missing_account_is_not_found() {
    let h = setup().await;
    let session = h.contexts.begin(Uuid::new_v4()).await;

    let result = h.contexts.switch(session, Uuid::new_v4()).await;
    assert!(matches!(result, Err(ArborError::NotFound { .. })));
}

#[tokio::test]
async fn switch_to_suspended_account_is_rejected() {
    let h = setup().await;
    let user = Uuid::new_v4();
    let root = h
        .root(
            "acme",
            Some(BillingInfo {
                status: BillingStatus::Suspended,
                plan: "enterprise".into(),
                limits: Default::default(),
            }),
        )
        .await;
    // Suspension inherits down to the division.
    let division = h.child(root, "d1").await;
    h.grant(user, root, Capability::CanViewUsage).await;

    let session = h.contexts.begin(user).await;
    for account in [root, division] {
        let result = h.contexts.switch(session, account).await;
        assert!(matches!(result, Err(ArborError::AccountSuspended { .. })));
    }
}

#[tokio::test]
async fn repeated_switches_replace_the_active_account() {
    let h = setup().await;
    let user = Uuid::new_v4();
    let root = h.root("acme", None).await;
    let d1 = h.child(root, "d1").await;
    let d2 = h.child(root, "d2").await;
    h.grant(user, root, Capability::CanViewUsage).await;

    let session = h.contexts.begin(user).await;
    h.contexts.switch(session, d1).await.unwrap();
    h.contexts.switch(session, d2).await.unwrap();

    let active = h.contexts.active_context(session).await.unwrap();
    assert_eq!(active.active_account_id, d2);
}

#[tokio::test]
async fn switch_revalidates_after_revocation() {
    let h = setup().await;
    let user = Uuid::new_v4();
    let root = h.root("acme", None).await;
    h.grant(user, root, Capability::CanViewUsage).await;

    let session = h.contexts.begin(user).await;
    h.contexts.switch(session, root).await.unwrap();

    h.grants.revoke(user, root).await.unwrap();

    // Nothing is cached across switches; the revocation bites.
    let result = h.contexts.switch(session, root).await;
    assert!(matches!(result, Err(ArborError::AccessDenied { .. })));
}

#[tokio::test]
async fn ended_sessions_reject_further_switches() {
    let h = setup().await;
    let user = Uuid::new_v4();
    let root = h.root("acme", None).await;
    h.grant(user, root, Capability::CanViewUsage).await;

    let session = h.contexts.begin(user).await;
    h.contexts.switch(session, root).await.unwrap();
    h.contexts.end(session).await;

    assert!(h.contexts.active_context(session).await.is_none());
    let result = h.contexts.switch(session, root).await;
    assert!(matches!(result, Err(ArborError::Validation { .. })));
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let h = setup().await;
    let root = h.root("acme", None).await;

    let result = h
        .contexts
        .switch(arbor_core::models::context::SessionId::generate(), root)
        .await;
    assert!(matches!(result, Err(ArborError::NotFound { .. })));
}
