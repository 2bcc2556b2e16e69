//! SurrealDB implementation of [`AccountRepository`].
//!
//! Structural invariants (quota, depth, child types) are enforced by
//! the hierarchy resolver in `arbor-engine`; this layer provides the
//! atomic primitives it builds on: single-statement creates, versioned
//! compare-and-swap updates, and transactional subtree path rewrites.

use arbor_core::error::ArborResult;
use arbor_core::models::account::{
    Account, AccountSettings, AccountType, BillingInfo, NewAccount, PathUpdate, UpdateAccount,
    UsageCounters,
};
use arbor_core::repository::AccountRepository;
use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct AccountRow {
    parent_id: Option<String>,
    name: String,
    company: Option<String>,
    description: Option<String>,
    slug: String,
    account_path: String,
    level: u32,
    account_type: String,
    settings: serde_json::Value,
    billing: serde_json::Value,
    usage: serde_json::Value,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct AccountRowWithId {
    record_id: String,
    parent_id: Option<String>,
    name: String,
    company: Option<String>,
    description: Option<String>,
    slug: String,
    account_path: String,
    level: u32,
    account_type: String,
    settings: serde_json::Value,
    billing: serde_json::Value,
    usage: serde_json::Value,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

fn decode_object<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    what: &str,
) -> Result<T, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::Decode(format!("invalid {what}: {e}")))
}

fn row_to_account(row: AccountRow, id: Uuid) -> Result<Account, DbError> {
    let parent_id = row
        .parent_id
        .map(|p| parse_uuid(&p, "parent"))
        .transpose()?;
    let account_type = AccountType::parse(&row.account_type)
        .ok_or_else(|| DbError::Decode(format!("unknown account type: {}", row.account_type)))?;
    Ok(Account {
        id,
        parent_id,
        name: row.name,
        company: row.company,
        description: row.description,
        slug: row.slug,
        account_path: row.account_path,
        level: row.level,
        account_type,
        settings: decode_object::<AccountSettings>(row.settings, "settings")?,
        billing: decode_object::<BillingInfo>(row.billing, "billing")?,
        usage: decode_object::<UsageCounters>(row.usage, "usage")?,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl AccountRowWithId {
    fn try_into_account(self) -> Result<Account, DbError> {
        let id = parse_uuid(&self.record_id, "record")?;
        row_to_account(
            AccountRow {
                parent_id: self.parent_id,
                name: self.name,
                company: self.company,
                description: self.description,
                slug: self.slug,
                account_path: self.account_path,
                level: self.level,
                account_type: self.account_type,
                settings: self.settings,
                billing: self.billing,
                usage: self.usage,
                version: self.version,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            id,
        )
    }
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::Decode(format!("cannot encode {what}: {e}")))
}

/// Map sibling-slug uniqueness violations to `Conflict`; everything
/// else stays a storage error.
fn map_write_err(e: surrealdb::Error) -> DbError {
    let msg = e.to_string();
    if msg.contains("idx_account_parent_slug") {
        DbError::Conflict(msg)
    } else {
        DbError::Surreal(e)
    }
}

const SELECT_WITH_ID: &str = "SELECT meta::id(id) AS record_id, * FROM account";

/// SurrealDB implementation of the account store.
#[derive(Clone)]
pub struct SurrealAccountRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccountRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AccountRepository for SurrealAccountRepository<C> {
    async fn create(&self, input: NewAccount) -> ArborResult<Account> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let parent_id_str = input.parent_id.map(|p| p.to_string());

        let result = self
            .db
            .query(
                "CREATE type::record('account', $id) SET \
                 parent_id = $parent_id, \
                 name = $name, company = $company, \
                 description = $description, slug = $slug, \
                 account_path = $account_path, level = $level, \
                 account_type = $account_type, settings = $settings, \
                 billing = $billing, usage = $usage",
            )
            .bind(("id", id_str.clone()))
            .bind(("parent_id", parent_id_str))
            .bind(("name", input.name))
            .bind(("company", input.company))
            .bind(("description", input.description))
            .bind(("slug", input.slug))
            .bind(("account_path", input.account_path))
            .bind(("level", input.level))
            .bind(("account_type", input.account_type.as_str()))
            .bind(("settings", to_json(&input.settings, "settings")?))
            .bind(("billing", to_json(&input.billing, "billing")?))
            .bind(("usage", to_json(&UsageCounters::default(), "usage")?))
            .await
            .map_err(map_write_err)?;

        let mut result = result.check().map_err(map_write_err)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "account".into(),
            id: id_str,
        })?;

        Ok(row_to_account(row, id)?)
    }

    async fn get(&self, id: Uuid) -> ArborResult<Account> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('account', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "account".into(),
            id: id_str,
        })?;

        Ok(row_to_account(row, id)?)
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        patch: UpdateAccount,
    ) -> ArborResult<Account> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if patch.name.is_some() {
            sets.push("name = $name");
        }
        if patch.company.is_some() {
            sets.push("company = $company");
        }
        if patch.description.is_some() {
            sets.push("description = $description");
        }
        if patch.settings.is_some() {
            sets.push("settings = $settings");
        }
        if patch.billing.is_some() {
            sets.push("billing = $billing");
        }
        sets.push("version = version + 1");
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('account', $id) SET {} \
             WHERE version = $expected_version",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("expected_version", expected_version));

        if let Some(name) = patch.name {
            builder = builder.bind(("name", name));
        }
        if let Some(company) = patch.company {
            builder = builder.bind(("company", company));
        }
        if let Some(description) = patch.description {
            builder = builder.bind(("description", description));
        }
        if let Some(settings) = patch.settings {
            builder = builder.bind(("settings", to_json(&settings, "settings")?));
        }
        if let Some(billing) = patch.billing {
            builder = builder.bind(("billing", to_json(&billing, "billing")?));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(row_to_account(row, id)?),
            // Zero rows matched: either the account is gone or the
            // version moved underneath us.
            None => match self.get(id).await {
                Ok(current) => Err(DbError::Conflict(format!(
                    "account {id} is at version {}, expected {expected_version}",
                    current.version
                ))
                .into()),
                Err(e) => Err(e),
            },
        }
    }

    async fn set_usage(&self, id: Uuid, usage: UsageCounters) -> ArborResult<()> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "UPDATE type::record('account', $id) SET \
                 usage = $usage, updated_at = time::now()",
            )
            .bind(("id", id_str.clone()))
            .bind(("usage", to_json(&usage, "usage")?))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "account".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }

    async fn rename(
        &self,
        id: Uuid,
        expected_version: u64,
        new_slug: String,
        path_updates: Vec<PathUpdate>,
    ) -> ArborResult<Account> {
        let id_str = id.to_string();

        // Slug change and every descendant path rewrite commit in one
        // transaction; a version mismatch aborts the whole batch via
        // THROW. Record ids are embedded literally (UUID format, safe).
        let mut query = String::from(
            "BEGIN TRANSACTION; \
             LET $renamed = (UPDATE type::record('account', $id) SET \
             slug = $slug, version = version + 1, \
             updated_at = time::now() \
             WHERE version = $expected_version); \
             IF array::len($renamed) == 0 { THROW 'rename-version-conflict' };",
        );
        for (i, update) in path_updates.iter().enumerate() {
            query.push_str(&format!(
                " UPDATE account:`{}` SET account_path = $path_{i};",
                update.id
            ));
        }
        query.push_str(" COMMIT TRANSACTION;");

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("slug", new_slug))
            .bind(("expected_version", expected_version));
        for (i, update) in path_updates.into_iter().enumerate() {
            builder = builder.bind((format!("path_{i}"), update.account_path));
        }

        let mut result = builder.await.map_err(|e| {
            let msg = e.to_string();
            if msg.contains("rename-version-conflict") {
                DbError::Conflict(format!(
                    "account {id} changed concurrently, expected version {expected_version}"
                ))
            } else {
                map_write_err(e)
            }
        })?;
        // In an aborted transaction every statement carries an error, and
        // `check()` only surfaces the first one (a generic "not executed");
        // the THROW message lands on a later statement, so scan them all.
        let errors = result.take_errors();
        if !errors.is_empty() {
            if errors
                .values()
                .any(|e| e.to_string().contains("rename-version-conflict"))
            {
                return Err(DbError::Conflict(format!(
                    "account {id} changed concurrently, expected version {expected_version}"
                ))
                .into());
            }
            let first = errors
                .into_iter()
                .min_by_key(|(i, _)| *i)
                .map(|(_, e)| e)
                .expect("non-empty");
            return Err(map_write_err(first).into());
        }

        self.get(id).await
    }

    async fn update_paths(&self, path_updates: Vec<PathUpdate>) -> ArborResult<()> {
        if path_updates.is_empty() {
            return Ok(());
        }

        let mut query = String::from("BEGIN TRANSACTION;");
        for (i, update) in path_updates.iter().enumerate() {
            query.push_str(&format!(
                " UPDATE account:`{}` SET account_path = $path_{i};",
                update.id
            ));
        }
        query.push_str(" COMMIT TRANSACTION;");

        let mut builder = self.db.query(&query);
        for (i, update) in path_updates.into_iter().enumerate() {
            builder = builder.bind((format!("path_{i}"), update.account_path));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> ArborResult<()> {
        self.db
            .query("DELETE type::record('account', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn children_of(&self, id: Uuid) -> ArborResult<Vec<Account>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_WITH_ID} WHERE parent_id = $parent_id \
                 ORDER BY created_at ASC, slug ASC"
            ))
            .bind(("parent_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_account())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn count_children(&self, id: Uuid) -> ArborResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM account \
                 WHERE parent_id = $parent_id GROUP ALL",
            )
            .bind(("parent_id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn list_by_path_prefix(&self, prefix: &str) -> ArborResult<Vec<Account>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_WITH_ID} \
                 WHERE string::starts_with(account_path, $prefix) \
                 ORDER BY account_path ASC"
            ))
            .bind(("prefix", prefix.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_account())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }

    async fn list_roots(&self) -> ArborResult<Vec<Account>> {
        let mut result = self
            .db
            .query(format!(
                "{SELECT_WITH_ID} WHERE parent_id = NONE \
                 ORDER BY created_at ASC, slug ASC"
            ))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRowWithId> = result.take(0).map_err(DbError::from)?;

        rows.into_iter()
            .map(|row| row.try_into_account())
            .collect::<Result<Vec<_>, DbError>>()
            .map_err(Into::into)
    }
}
