//! # Operation Log Repository
//!
//! The durable, append-only operation trail.
//!
//! ## Same-Transaction Append
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. UPDATE packages SET status = 'completed' WHERE id = ?               │
//! │  2. INSERT INTO operation_log (op_type, payload, ...)                   │
//! │     VALUES ('complete_package', '{"package_id":"…"}', ...)              │
//! │                                                                         │
//! │  COMMIT ← both or neither                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The trail is never trimmed. Insertion order (rowid) is the canonical
//! order, so entries written by one transaction keep their sequence even
//! when their timestamps tie.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use packline_core::OperationLogEntry;

#[derive(Debug, sqlx::FromRow)]
struct OperationLogRow {
    id: String,
    op_type: String,
    payload: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl From<OperationLogRow> for OperationLogEntry {
    fn from(r: OperationLogRow) -> Self {
        OperationLogEntry {
            id: r.id,
            op_type: r.op_type,
            payload: r.payload,
            description: r.description,
            created_at: r.created_at,
        }
    }
}

/// Appends one entry and returns it.
pub(crate) async fn append(
    conn: &mut SqliteConnection,
    op_type: &str,
    payload: &str,
    description: &str,
) -> DbResult<OperationLogEntry> {
    let entry = OperationLogEntry {
        id: Uuid::new_v4().to_string(),
        op_type: op_type.to_string(),
        payload: payload.to_string(),
        description: description.to_string(),
        created_at: Utc::now(),
    };

    debug!(op_type = %entry.op_type, entry_id = %entry.id, "Appending to operation log");

    sqlx::query(
        r#"
        INSERT INTO operation_log (id, op_type, payload, description, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.op_type)
    .bind(&entry.payload)
    .bind(&entry.description)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

/// Read access to the operation trail.
#[derive(Debug, Clone)]
pub struct OperationLogRepository {
    pool: SqlitePool,
}

impl OperationLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OperationLogRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<OperationLogEntry>> {
        let row = sqlx::query_as::<_, OperationLogRow>(
            "SELECT id, op_type, payload, description, created_at FROM operation_log WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(OperationLogEntry::from))
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<OperationLogEntry>> {
        let rows = sqlx::query_as::<_, OperationLogRow>(
            r#"
            SELECT id, op_type, payload, description, created_at
            FROM operation_log
            ORDER BY rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(OperationLogEntry::from).collect())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM operation_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
