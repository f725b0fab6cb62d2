//! # Package Repository
//!
//! Packages and their cached member counts.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::decode;
use crate::error::DbResult;
use packline_core::{Package, PackageStatus};

const COLUMNS: &str = "id, order_id, package_number, sequence_index, pallet_id, packing_method, \
                       status, is_manual, component_count, created_at, updated_at, \
                       completed_at, sealed_at";

#[derive(Debug, sqlx::FromRow)]
struct PackageRow {
    id: String,
    order_id: String,
    package_number: String,
    sequence_index: i64,
    pallet_id: Option<String>,
    packing_method: String,
    status: String,
    is_manual: bool,
    component_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    sealed_at: Option<DateTime<Utc>>,
}

impl PackageRow {
    fn into_domain(self) -> DbResult<Package> {
        Ok(Package {
            packing_method: decode("package", "packing_method", &self.packing_method)?,
            status: decode("package", "status", &self.status)?,
            id: self.id,
            order_id: self.order_id,
            package_number: self.package_number,
            sequence_index: self.sequence_index,
            pallet_id: self.pallet_id,
            is_manual: self.is_manual,
            component_count: self.component_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            sealed_at: self.sealed_at,
        })
    }
}

fn decode_all(rows: Vec<PackageRow>) -> DbResult<Vec<Package>> {
    rows.into_iter().map(PackageRow::into_domain).collect()
}

// =============================================================================
// Connection-Level Operations
// =============================================================================

pub(crate) async fn insert(conn: &mut SqliteConnection, p: &Package) -> DbResult<()> {
    debug!(package_id = %p.id, number = %p.package_number, "Inserting package");

    sqlx::query(
        r#"
        INSERT INTO packages (
            id, order_id, package_number, sequence_index, pallet_id, packing_method,
            status, is_manual, component_count, created_at, updated_at,
            completed_at, sealed_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&p.id)
    .bind(&p.order_id)
    .bind(&p.package_number)
    .bind(p.sequence_index)
    .bind(&p.pallet_id)
    .bind(p.packing_method.as_str())
    .bind(p.status.as_str())
    .bind(p.is_manual)
    .bind(p.component_count)
    .bind(p.created_at)
    .bind(p.updated_at)
    .bind(p.completed_at)
    .bind(p.sealed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Package>> {
    let sql = format!("SELECT {COLUMNS} FROM packages WHERE id = ?1");
    let row = sqlx::query_as::<_, PackageRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(PackageRow::into_domain).transpose()
}

pub(crate) async fn fetch_by_pallet(conn: &mut SqliteConnection, pallet_id: &str) -> DbResult<Vec<Package>> {
    let sql = format!("SELECT {COLUMNS} FROM packages WHERE pallet_id = ?1 ORDER BY sequence_index");
    let rows = sqlx::query_as::<_, PackageRow>(&sql)
        .bind(pallet_id)
        .fetch_all(&mut *conn)
        .await?;
    decode_all(rows)
}

/// Writes the mutable columns of `p` (status, pallet link, timestamps,
/// count) and bumps `updated_at`.
pub(crate) async fn update(conn: &mut SqliteConnection, p: &Package) -> DbResult<()> {
    debug!(package_id = %p.id, status = %p.status, "Updating package");

    sqlx::query(
        r#"
        UPDATE packages SET
            pallet_id = ?2,
            packing_method = ?3,
            status = ?4,
            component_count = ?5,
            updated_at = ?6,
            completed_at = ?7,
            sealed_at = ?8
        WHERE id = ?1
        "#,
    )
    .bind(&p.id)
    .bind(&p.pallet_id)
    .bind(p.packing_method.as_str())
    .bind(p.status.as_str())
    .bind(p.component_count)
    .bind(Utc::now())
    .bind(p.completed_at)
    .bind(p.sealed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Recomputes the cached member count from the component table.
pub(crate) async fn recount(conn: &mut SqliteConnection, id: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM components WHERE package_id = ?1")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query("UPDATE packages SET component_count = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(id)
        .bind(count)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(count)
}

pub(crate) async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(package_id = %id, "Deleting package row");
    sqlx::query("DELETE FROM packages WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Sequence indices held by live packages of the order.
pub(crate) async fn used_indices(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<i64>> {
    let indices = sqlx::query_scalar("SELECT sequence_index FROM packages WHERE order_id = ?1")
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(indices)
}

/// Number of packages whose number starts with `prefix`.
pub(crate) async fn count_numbered(conn: &mut SqliteConnection, prefix: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM packages WHERE substr(package_number, 1, ?1) = ?2",
    )
    .bind(prefix.chars().count() as i64)
    .bind(prefix)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

pub(crate) async fn number_taken(conn: &mut SqliteConnection, number: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM packages WHERE package_number = ?1")
        .bind(number)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn index_taken(conn: &mut SqliteConnection, order_id: &str, index: i64) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM packages WHERE order_id = ?1 AND sequence_index = ?2",
    )
    .bind(order_id)
    .bind(index)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(found.is_some())
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to packages.
#[derive(Debug, Clone)]
pub struct PackageRepository {
    pool: SqlitePool,
}

impl PackageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PackageRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Package>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Package>> {
        let sql = format!("SELECT {COLUMNS} FROM packages WHERE package_number = ?1");
        let row = sqlx::query_as::<_, PackageRow>(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PackageRow::into_domain).transpose()
    }

    /// Packages of an order in "package N of M" order.
    pub async fn list_by_order(&self, order_id: &str) -> DbResult<Vec<Package>> {
        let sql = format!("SELECT {COLUMNS} FROM packages WHERE order_id = ?1 ORDER BY sequence_index");
        let rows = sqlx::query_as::<_, PackageRow>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }

    /// Packages currently on a pallet.
    pub async fn list_by_pallet(&self, pallet_id: &str) -> DbResult<Vec<Package>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_pallet(&mut conn, pallet_id).await
    }

    /// Package counts of the order per status. Legacy spellings are folded
    /// into their canonical status before counting.
    pub async fn count_by_status(&self, order_id: &str) -> DbResult<Vec<(PackageStatus, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM packages WHERE order_id = ?1 GROUP BY status",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: Vec<(PackageStatus, i64)> = Vec::new();
        for (raw, count) in rows {
            let status: PackageStatus = decode("package", "status", &raw)?;
            match counts.iter_mut().find(|(s, _)| *s == status) {
                Some((_, total)) => *total += count,
                None => counts.push((status, count)),
            }
        }
        counts.sort_by_key(|(status, _)| *status as u8);
        Ok(counts)
    }

    pub async fn count_by_order(&self, order_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM packages WHERE order_id = ?1")
            .bind(order_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
