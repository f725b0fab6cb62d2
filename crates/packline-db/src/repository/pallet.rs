//! # Pallet Repository
//!
//! Pallets and the informational `pallet_packages` join.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::decode;
use crate::error::DbResult;
use packline_core::{Pallet, PalletPackage};

const COLUMNS: &str = "id, order_id, pallet_number, sequence_index, is_virtual, status, \
                       sealed_at, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct PalletRow {
    id: String,
    order_id: String,
    pallet_number: String,
    sequence_index: i64,
    is_virtual: bool,
    status: String,
    sealed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PalletRow {
    fn into_domain(self) -> DbResult<Pallet> {
        Ok(Pallet {
            status: decode("pallet", "status", &self.status)?,
            id: self.id,
            order_id: self.order_id,
            pallet_number: self.pallet_number,
            sequence_index: self.sequence_index,
            is_virtual: self.is_virtual,
            sealed_at: self.sealed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PalletPackageRow {
    pallet_id: String,
    package_id: String,
    added_at: DateTime<Utc>,
}

// =============================================================================
// Connection-Level Operations
// =============================================================================

pub(crate) async fn insert(conn: &mut SqliteConnection, p: &Pallet) -> DbResult<()> {
    debug!(pallet_id = %p.id, number = %p.pallet_number, "Inserting pallet");

    sqlx::query(
        r#"
        INSERT INTO pallets (
            id, order_id, pallet_number, sequence_index, is_virtual, status,
            sealed_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&p.id)
    .bind(&p.order_id)
    .bind(&p.pallet_number)
    .bind(p.sequence_index)
    .bind(p.is_virtual)
    .bind(p.status.as_str())
    .bind(p.sealed_at)
    .bind(p.created_at)
    .bind(p.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Pallet>> {
    let sql = format!("SELECT {COLUMNS} FROM pallets WHERE id = ?1");
    let row = sqlx::query_as::<_, PalletRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(PalletRow::into_domain).transpose()
}

/// Writes status and `sealed_at`, bumping `updated_at`.
pub(crate) async fn update(conn: &mut SqliteConnection, p: &Pallet) -> DbResult<()> {
    debug!(pallet_id = %p.id, status = %p.status, "Updating pallet");

    sqlx::query("UPDATE pallets SET status = ?2, sealed_at = ?3, updated_at = ?4 WHERE id = ?1")
        .bind(&p.id)
        .bind(p.status.as_str())
        .bind(p.sealed_at)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(pallet_id = %id, "Deleting pallet row");
    sqlx::query("DELETE FROM pallets WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn used_indices(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<i64>> {
    let indices = sqlx::query_scalar("SELECT sequence_index FROM pallets WHERE order_id = ?1")
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(indices)
}

/// Number of pallets whose number starts with `prefix`.
pub(crate) async fn count_numbered(conn: &mut SqliteConnection, prefix: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pallets WHERE substr(pallet_number, 1, ?1) = ?2",
    )
    .bind(prefix.chars().count() as i64)
    .bind(prefix)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count)
}

pub(crate) async fn number_taken(conn: &mut SqliteConnection, number: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM pallets WHERE pallet_number = ?1")
        .bind(number)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

pub(crate) async fn index_taken(conn: &mut SqliteConnection, order_id: &str, index: i64) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM pallets WHERE order_id = ?1 AND sequence_index = ?2",
    )
    .bind(order_id)
    .bind(index)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(found.is_some())
}

// -----------------------------------------------------------------------------
// Join rows
// -----------------------------------------------------------------------------

pub(crate) async fn link(conn: &mut SqliteConnection, pallet_id: &str, package_id: &str) -> DbResult<()> {
    sqlx::query(
        "INSERT OR REPLACE INTO pallet_packages (pallet_id, package_id, added_at) VALUES (?1, ?2, ?3)",
    )
    .bind(pallet_id)
    .bind(package_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn unlink(conn: &mut SqliteConnection, pallet_id: &str, package_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM pallet_packages WHERE pallet_id = ?1 AND package_id = ?2")
        .bind(pallet_id)
        .bind(package_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn unlink_pallet(conn: &mut SqliteConnection, pallet_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM pallet_packages WHERE pallet_id = ?1")
        .bind(pallet_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn unlink_package(conn: &mut SqliteConnection, package_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM pallet_packages WHERE package_id = ?1")
        .bind(package_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to pallets.
#[derive(Debug, Clone)]
pub struct PalletRepository {
    pool: SqlitePool,
}

impl PalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PalletRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Pallet>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn get_by_number(&self, number: &str) -> DbResult<Option<Pallet>> {
        let sql = format!("SELECT {COLUMNS} FROM pallets WHERE pallet_number = ?1");
        let row = sqlx::query_as::<_, PalletRow>(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PalletRow::into_domain).transpose()
    }

    pub async fn list_by_order(&self, order_id: &str) -> DbResult<Vec<Pallet>> {
        let sql = format!("SELECT {COLUMNS} FROM pallets WHERE order_id = ?1 ORDER BY sequence_index");
        let rows = sqlx::query_as::<_, PalletRow>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(PalletRow::into_domain).collect()
    }

    pub async fn count_by_order(&self, order_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pallets WHERE order_id = ?1")
            .bind(order_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Join rows of a pallet, oldest first.
    pub async fn memberships(&self, pallet_id: &str) -> DbResult<Vec<PalletPackage>> {
        let rows = sqlx::query_as::<_, PalletPackageRow>(
            "SELECT pallet_id, package_id, added_at FROM pallet_packages WHERE pallet_id = ?1 ORDER BY added_at",
        )
        .bind(pallet_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| PalletPackage {
                pallet_id: r.pallet_id,
                package_id: r.package_id,
                added_at: r.added_at,
            })
            .collect())
    }
}
