//! Integration tests for usage roll-ups and effective-billing
//! resolution.

use arbor_core::error::ArborError;
use arbor_core::models::account::{
    AccountType, BillingInfo, BillingStatus, CreateRootAccount, CreateSubAccount,
    SettingsOverrides, UsageCounters,
};
use arbor_core::repository::AccountRepository;
use arbor_db::repository::SurrealAccountRepository;
use arbor_engine::{EngineConfig, HierarchyResolver, UsageAggregator};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Harness {
    hierarchy: HierarchyResolver<SurrealAccountRepository<Db>>,
    usage: UsageAggregator<SurrealAccountRepository<Db>>,
}

async fn setup() -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    arbor_db::run_migrations(&db).await.unwrap();

    let hierarchy = HierarchyResolver::new(
        SurrealAccountRepository::new(db),
        EngineConfig::default(),
    );
    Harness {
        usage: UsageAggregator::new(hierarchy.clone()),
        hierarchy,
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

    async fn child(
        &self,
        parent: Uuid,
        slug: &str,
        ty: AccountType,
        billing: Option<BillingInfo>,
    ) -> Uuid {
        self.hierarchy
            .create_sub_account(
                parent,
                CreateSubAccount {
                    name: format!("Sub {slug}"),
                    company: None,
                    description: None,
                    slug: slug.into(),
                    account_type: ty,
                    settings: SettingsOverrides::default(),
                    billing,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn record_usage(&self, id: Uuid, storage: u64, sources: u64, jobs: u64, calls: u64) {
        self.hierarchy
            .store()
            .set_usage(
                id,
                UsageCounters {
                    storage_bytes: storage,
                    source_count: sources,
                    job_count: jobs,
                    api_calls: calls,
                },
            )
            .await
            .unwrap();
    }
}

fn paid(plan: &str) -> BillingInfo {
    BillingInfo {
        status: BillingStatus::Active,
        plan: plan.into(),
        limits: Default::default(),
    }
}

fn suspended(plan: &str) -> BillingInfo {
    BillingInfo {
        status: BillingStatus::Suspended,
        plan: plan.into(),
        limits: Default::default(),
    }
}

// -----------------------------------------------------------------------
// Aggregation
// -----------------------------------------------------------------------

#[tokio::test]
async fn aggregate_sums_account_and_descendants() {
    let h = setup().await;
    let root = h.root("acme", None).await;
    let division = h.child(root, "d1", AccountType::Division, None).await;
    let location = h.child(division, "l1", AccountType::Location, None).await;
    // A sibling branch whose counters must also land in the root total.
    let other = h.child(root, "d2", AccountType::Division, None).await;

    h.record_usage(root, 100, 1, 2, 10).await;
    h.record_usage(division, 200, 2, 4, 20).await;
    h.record_usage(location, 300, 3, 6, 30).await;
    h.record_usage(other, 400, 4, 8, 40).await;

    let total = h.usage.aggregate(root).await.unwrap();
    assert_eq!(total.storage_bytes, 1000);
    assert_eq!(total.source_count, 10);
    assert_eq!(total.job_count, 20);
    assert_eq!(total.api_calls, 100);
    assert_eq!(total.descendant_count, 3);

    // Scoped to a branch, the sibling's counters disappear.
    let branch = h.usage.aggregate(division).await.unwrap();
    assert_eq!(branch.storage_bytes, 500);
    assert_eq!(branch.descendant_count, 1);
}

#[tokio::test]
async fn aggregate_of_leaf_is_its_own_counters() {
    let h = setup().await;
    let root = h.root("acme", None).await;
    h.record_usage(root, 42, 1, 1, 1).await;

    let summary = h.usage.aggregate(root).await.unwrap();
    assert_eq!(summary.storage_bytes, 42);
    assert_eq!(summary.descendant_count, 0);
}

#[tokio::test]
async fn aggregate_missing_account_is_not_found() {
    let h = setup().await;

    let result = h.usage.aggregate(Uuid::new_v4()).await;
    assert!(matches!(result, Err(ArborError::NotFound { .. })));
}

// -----------------------------------------------------------------------
// Effective billing
// -----------------------------------------------------------------------

#[tokio::test]
async fn own_billing_wins_when_not_inherited() {
    let h = setup().await;
    let root = h.root("acme", Some(paid("enterprise"))).await;
    let division = h
        .child(root, "d1", AccountType::Division, Some(paid("team")))
        .await;

    let effective = h.usage.effective_billing(division).await.unwrap();
    assert_eq!(effective.status, BillingStatus::Active);
    assert_eq!(effective.plan, "team");
}

#[tokio::test]
async fn inherited_billing_resolves_to_nearest_ancestor() {
    let h = setup().await;
    let root = h.root("acme", Some(paid("enterprise"))).await;
    // Three inherited levels in a row all land on the root's plan.
    let subsidiary = h.child(root, "s1", AccountType::Subsidiary, None).await;
    let division = h.child(subsidiary, "d1", AccountType::Division, None).await;
    let location = h.child(division, "l1", AccountType::Location, None).await;

    for account in [subsidiary, division, location] {
        let effective = h.usage.effective_billing(account).await.unwrap();
        assert_eq!(effective.plan, "enterprise");
        assert_eq!(effective.status, BillingStatus::Active);
    }

    // Resolution is stable across repeated calls.
    let again = h.usage.effective_billing(location).await.unwrap();
    assert_eq!(again.plan, "enterprise");
}

#[tokio::test]
async fn intermediate_plan_shadows_the_root() {
    let h = setup().await;
    let root = h.root("acme", Some(paid("enterprise"))).await;
    let division = h
        .child(root, "d1", AccountType::Division, Some(paid("team")))
        .await;
    let location = h.child(division, "l1", AccountType::Location, None).await;

    let effective = h.usage.effective_billing(location).await.unwrap();
    assert_eq!(effective.plan, "team");
}

#[tokio::test]
async fn falls_back_to_default_free_plan() {
    let h = setup().await;
    // A root explicitly marked inherited has nothing to inherit from.
    let root = h.root("acme", Some(BillingInfo::inherited())).await;
    let division = h.child(root, "d1", AccountType::Division, None).await;

    for account in [root, division] {
        let effective = h.usage.effective_billing(account).await.unwrap();
        assert_eq!(effective.status, BillingStatus::Free);
        assert_eq!(effective.plan, "free");
    }
}

#[tokio::test]
async fn suspension_propagates_through_inheritance() {
    let h = setup().await;
    let root = h.root("acme", Some(suspended("enterprise"))).await;
    let division = h.child(root, "d1", AccountType::Division, None).await;

    let effective = h.usage.effective_billing(division).await.unwrap();
    assert_eq!(effective.status, BillingStatus::Suspended);
}
