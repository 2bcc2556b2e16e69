//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. Nested settings/billing/usage
//! documents are FLEXIBLE objects decoded by the repository layer.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Accounts (the tenancy tree)
-- =======================================================================
DEFINE TABLE account SCHEMAFULL;
DEFINE FIELD parent_id ON TABLE account TYPE option<string>;
DEFINE FIELD name ON TABLE account TYPE string;
DEFINE FIELD company ON TABLE account TYPE option<string>;
DEFINE FIELD description ON TABLE account TYPE option<string>;
DEFINE FIELD slug ON TABLE account TYPE string;
DEFINE FIELD account_path ON TABLE account TYPE string;
DEFINE FIELD level ON TABLE account TYPE int;
DEFINE FIELD account_type ON TABLE account TYPE string \
    ASSERT $value IN ['root', 'subsidiary', 'division', 'location', \
    'franchise'];
DEFINE FIELD settings ON TABLE account TYPE object FLEXIBLE;
DEFINE FIELD billing ON TABLE account TYPE object FLEXIBLE;
DEFINE FIELD usage ON TABLE account TYPE object FLEXIBLE;
DEFINE FIELD version ON TABLE account TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE account TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE account TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_account_parent ON TABLE account COLUMNS parent_id;
DEFINE INDEX idx_account_parent_slug ON TABLE account \
    COLUMNS parent_id, slug UNIQUE;
DEFINE INDEX idx_account_path ON TABLE account COLUMNS account_path;

-- =======================================================================
-- Access Grants (user <-> account capability assignments)
-- =======================================================================
DEFINE TABLE access_grant SCHEMAFULL;
DEFINE FIELD user_id ON TABLE access_grant TYPE string;
DEFINE FIELD account_id ON TABLE access_grant TYPE string;
DEFINE FIELD capabilities ON TABLE access_grant TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD created_at ON TABLE access_grant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE access_grant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_grant_user_account ON TABLE access_grant \
    COLUMNS user_id, account_id UNIQUE;
DEFINE INDEX idx_grant_account ON TABLE access_grant COLUMNS account_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
