//! ARBOR Server — application entry point.
//!
//! Initializes logging, connects to SurrealDB, runs migrations, and
//! wires the account-hierarchy engine. The RPC/HTTP surface consumes
//! the engine through its operation-level API; errors carry their own
//! status mapping via `ArborError::http_status`.

use arbor_db::repository::{SurrealAccountRepository, SurrealGrantStore};
use arbor_db::{DbConfig, DbManager};
use arbor_engine::{
    AccountContextManager, EngineConfig, HierarchyResolver, PermissionResolver, UsageAggregator,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("arbor=info".parse().expect("valid directive")),
        )
        .json()
        .init();

    info!("Starting ARBOR server...");

    let db_config = DbConfig::from_env();
    let manager = match DbManager::connect(&db_config).await {
        Ok(manager) => manager,
        Err(e) => {
            error!(error = %e, "Failed to connect to SurrealDB");
            std::process::exit(1);
        }
    };

    if let Err(e) = arbor_db::run_migrations(manager.client()).await {
        error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }

    let db = manager.client().clone();
    let accounts = SurrealAccountRepository::new(db.clone());
    let grants = SurrealGrantStore::new(db);

    let hierarchy = HierarchyResolver::new(accounts, EngineConfig::default());
    let permissions = PermissionResolver::new(hierarchy.clone(), grants);
    let usage = UsageAggregator::new(hierarchy.clone());
    let _contexts = AccountContextManager::new(permissions, usage);

    info!("ARBOR engine ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::process::exit(1);
    }

    info!("ARBOR server stopped.");
}
