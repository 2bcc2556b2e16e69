//! SurrealDB implementation of [`GrantStore`].
//!
//! The engine only reads grants; `put` and `revoke` are inherent
//! methods used by the application layer (and tests) to administer
//! the grant table.

use std::collections::BTreeMap;

use arbor_core::error::ArborResult;
use arbor_core::models::grant::{AccessGrant, Capability, CreateAccessGrant};
use arbor_core::repository::GrantStore;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GrantRow {
    user_id: String,
    account_id: String,
    capabilities: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GrantRow {
    fn try_into_grant(self) -> Result<AccessGrant, DbError> {
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
        let account_id = Uuid::parse_str(&self.account_id)
            .map_err(|e| DbError::Decode(format!("invalid account UUID: {e}")))?;
        let capabilities: BTreeMap<Capability, bool> = serde_json::from_value(self.capabilities)
            .map_err(|e| DbError::Decode(format!("invalid capabilities: {e}")))?;
        Ok(AccessGrant {
            user_id,
            account_id,
            capabilities,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Deterministic record id for the `(user, account)` pair, so `put`
/// is a natural upsert.
fn grant_record_id(user_id: Uuid, account_id: Uuid) -> String {
    format!("{user_id}_{account_id}")
}

/// SurrealDB implementation of the access-grant adapter.
#[derive(Clone)]
pub struct SurrealGrantStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGrantStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Create or replace the grant for a `(user, account)` pair.
    pub async fn put(&self, input: CreateAccessGrant) -> ArborResult<AccessGrant> {
        let record_id = grant_record_id(input.user_id, input.account_id);
        let capabilities = serde_json::to_value(&input.capabilities)
            .map_err(|e| DbError::Decode(format!("cannot encode capabilities: {e}")))?;

        let result = self
            .db
            .query(
                "UPSERT type::record('access_grant', $id) SET \
                 user_id = $user_id, account_id = $account_id, \
                 capabilities = $capabilities, \
                 updated_at = time::now()",
            )
            .bind(("id", record_id.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("account_id", input.account_id.to_string()))
            .bind(("capabilities", capabilities))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "access_grant".into(),
            id: record_id,
        })?;

        Ok(row.try_into_grant()?)
    }

    /// Remove the grant for a `(user, account)` pair. Idempotent.
    pub async fn revoke(&self, user_id: Uuid, account_id: Uuid) -> ArborResult<()> {
        self.db
            .query("DELETE type::record('access_grant', $id)")
            .bind(("id", grant_record_id(user_id, account_id)))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}

impl<C: Connection> GrantStore for SurrealGrantStore<C> {
    async fn grants_for_accounts(
        &self,
        user_id: Uuid,
        account_ids: &[Uuid],
    ) -> ArborResult<Vec<AccessGrant>> {
        if account_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = account_ids.iter().map(|a| a.to_string()).collect();

        let mut result = self
            .db
            .query(
                "SELECT * FROM access_grant \
                 WHERE user_id = $user_id AND account_id IN $account_ids",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("account_ids", ids))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_grant())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
