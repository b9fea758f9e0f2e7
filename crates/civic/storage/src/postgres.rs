//! PostgreSQL adapter for civic storage.
//!
//! Complaints are stored as JSONB documents next to the columns the service
//! filters on. Commits lock the row, compare versions and write in one
//! transaction, so the mutation and its timeline append land together.

use crate::traits::{check_append_only, ComplaintStore, QueryWindow, UserStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use civic_types::{Complaint, ComplaintId, Role, User, UserId};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresCivicStorage {
    pool: PgPool,
}

impl PostgresCivicStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Unavailable(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS civic_users (
                user_id TEXT PRIMARY KEY,
                email_key TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                record JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS civic_complaints (
                complaint_id TEXT PRIMARY KEY,
                created_by TEXT NOT NULL,
                assigned_employee TEXT,
                status TEXT NOT NULL,
                version BIGINT NOT NULL,
                record JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS civic_complaints_assignee_idx ON civic_complaints (assigned_employee, status)",
            "CREATE INDEX IF NOT EXISTS civic_complaints_created_idx ON civic_complaints (created_at DESC)",
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresCivicStorage {
    async fn insert_user(&self, user: User) -> StorageResult<()> {
        let record =
            serde_json::to_value(&user).map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO civic_users (user_id, email_key, role, record, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id.0.clone())
        .bind(user.email.trim().to_lowercase())
        .bind(user.role.as_str())
        .bind(record)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_user(&self, user: User) -> StorageResult<()> {
        let record =
            serde_json::to_value(&user).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE civic_users
               SET email_key = $1,
                   role = $2,
                   record = $3
             WHERE user_id = $4
            "#,
        )
        .bind(user.email.trim().to_lowercase())
        .bind(user.role.as_str())
        .bind(record)
        .bind(user.id.0.clone())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("user {} not found", user.id)));
        }
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT record FROM civic_users WHERE user_id = $1")
            .bind(id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(decode_record).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query("SELECT record FROM civic_users WHERE email_key = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(decode_record).transpose()
    }

    async fn list_users(&self, role: Option<Role>) -> StorageResult<Vec<User>> {
        let rows = match role {
            Some(role) => {
                sqlx::query(
                    "SELECT record FROM civic_users WHERE role = $1 ORDER BY created_at ASC, user_id ASC",
                )
                .bind(role.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT record FROM civic_users ORDER BY created_at ASC, user_id ASC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(decode_record).collect()
    }
}

#[async_trait]
impl ComplaintStore for PostgresCivicStorage {
    async fn insert_complaint(&self, mut complaint: Complaint) -> StorageResult<Complaint> {
        if !complaint.timeline_is_consistent() {
            return Err(StorageError::InvariantViolation(format!(
                "complaint {} has an inconsistent timeline",
                complaint.id
            )));
        }
        complaint.version = 1;
        let record = serde_json::to_value(&complaint)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO civic_complaints
                (complaint_id, created_by, assigned_employee, status, version, record, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 1, $5, $6, $6)
            "#,
        )
        .bind(complaint.id.0.clone())
        .bind(complaint.created_by.0.clone())
        .bind(complaint.assigned_employee.as_ref().map(|id| id.0.clone()))
        .bind(complaint.status.as_str())
        .bind(record)
        .bind(complaint.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(complaint)
    }

    async fn get_complaint(&self, id: &ComplaintId) -> StorageResult<Option<Complaint>> {
        let row = sqlx::query("SELECT record FROM civic_complaints WHERE complaint_id = $1")
            .bind(id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(decode_record).transpose()
    }

    async fn commit_complaint(
        &self,
        mut complaint: Complaint,
        expected_version: u64,
    ) -> StorageResult<Complaint> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query(
            "SELECT record FROM civic_complaints WHERE complaint_id = $1 FOR UPDATE",
        )
        .bind(complaint.id.0.clone())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| StorageError::NotFound(format!("complaint {} not found", complaint.id)))?;
        let stored: Complaint = decode_record(row)?;

        if stored.version != expected_version {
            return Err(StorageError::VersionConflict {
                id: complaint.id.to_string(),
                expected: expected_version,
                found: stored.version,
            });
        }
        check_append_only(&stored, &complaint)?;

        complaint.version = expected_version + 1;
        let record = serde_json::to_value(&complaint)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let updated_at = complaint
            .last_event()
            .map(|event| event.date)
            .unwrap_or(complaint.created_at);

        sqlx::query(
            r#"
            UPDATE civic_complaints
               SET assigned_employee = $1,
                   status = $2,
                   version = $3,
                   record = $4,
                   updated_at = $5
             WHERE complaint_id = $6
               AND version = $7
            "#,
        )
        .bind(complaint.assigned_employee.as_ref().map(|id| id.0.clone()))
        .bind(complaint.status.as_str())
        .bind(to_i64(complaint.version)?)
        .bind(record)
        .bind(updated_at)
        .bind(complaint.id.0.clone())
        .bind(to_i64(expected_version)?)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(complaint)
    }

    async fn list_complaints(&self, window: QueryWindow) -> StorageResult<Vec<Complaint>> {
        let rows = if window.limit == 0 {
            sqlx::query(
                r#"
                SELECT record FROM civic_complaints
                 ORDER BY created_at DESC, complaint_id DESC
                 OFFSET $1
                "#,
            )
            .bind(to_i64(window.offset as u64)?)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?
        } else {
            sqlx::query(
                r#"
                SELECT record FROM civic_complaints
                 ORDER BY created_at DESC, complaint_id DESC
                 LIMIT $1 OFFSET $2
                "#,
            )
            .bind(to_i64(window.limit as u64)?)
            .bind(to_i64(window.offset as u64)?)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?
        };

        rows.into_iter().map(decode_record).collect()
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

fn decode_record<T: serde::de::DeserializeOwned>(row: PgRow) -> StorageResult<T> {
    let value: serde_json::Value = row
        .try_get("record")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn to_i64(value: u64) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput(format!("value {value} exceeds i64 range")))
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StorageError::Conflict(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Unavailable(err.to_string())
        }
        sqlx::Error::RowNotFound => StorageError::NotFound(err.to_string()),
        other => StorageError::Backend(other.to_string()),
    }
}
