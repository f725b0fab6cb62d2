//! # Cargo Repository
//!
//! Non-component items loaded on a pallet (`virtual_items`).

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use packline_core::VirtualItem;

#[derive(Debug, sqlx::FromRow)]
struct VirtualItemRow {
    id: String,
    pallet_id: String,
    name: String,
    quantity: f64,
    unit: String,
    created_at: DateTime<Utc>,
}

impl From<VirtualItemRow> for VirtualItem {
    fn from(r: VirtualItemRow) -> Self {
        VirtualItem {
            id: r.id,
            pallet_id: r.pallet_id,
            name: r.name,
            quantity: r.quantity,
            unit: r.unit,
            created_at: r.created_at,
        }
    }
}

pub(crate) async fn insert(conn: &mut SqliteConnection, item: &VirtualItem) -> DbResult<()> {
    debug!(item_id = %item.id, pallet_id = %item.pallet_id, "Inserting cargo");

    sqlx::query(
        r#"
        INSERT INTO virtual_items (id, pallet_id, name, quantity, unit, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&item.id)
    .bind(&item.pallet_id)
    .bind(&item.name)
    .bind(item.quantity)
    .bind(&item.unit)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<VirtualItem>> {
    let row = sqlx::query_as::<_, VirtualItemRow>(
        "SELECT id, pallet_id, name, quantity, unit, created_at FROM virtual_items WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(VirtualItem::from))
}

pub(crate) async fn fetch_by_pallet(conn: &mut SqliteConnection, pallet_id: &str) -> DbResult<Vec<VirtualItem>> {
    let rows = sqlx::query_as::<_, VirtualItemRow>(
        r#"
        SELECT id, pallet_id, name, quantity, unit, created_at
        FROM virtual_items WHERE pallet_id = ?1 ORDER BY created_at
        "#,
    )
    .bind(pallet_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(VirtualItem::from).collect())
}

pub(crate) async fn delete(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM virtual_items WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn delete_by_pallet(conn: &mut SqliteConnection, pallet_id: &str) -> DbResult<()> {
    sqlx::query("DELETE FROM virtual_items WHERE pallet_id = ?1")
        .bind(pallet_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Read access to pallet cargo.
#[derive(Debug, Clone)]
pub struct CargoRepository {
    pool: SqlitePool,
}

impl CargoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CargoRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<VirtualItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn list_by_pallet(&self, pallet_id: &str) -> DbResult<Vec<VirtualItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_pallet(&mut conn, pallet_id).await
    }
}
