//! # Order Repository
//!
//! Orders are owned by the order-management collaborator. The store keeps a
//! reference row so components, packages and pallets have something to
//! point at.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use packline_core::Order;

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

pub(crate) async fn exists(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

/// Repository for order reference rows.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates an order reference with a fresh id.
    pub async fn create(&self, name: &str) -> DbResult<Order> {
        let order = Order {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.insert(&order).await?;
        Ok(order)
    }

    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(order_id = %order.id, name = %order.name, "Inserting order");

        sqlx::query("INSERT INTO orders (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&order.id)
            .bind(&order.name)
            .bind(order.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, name, created_at FROM orders WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// All orders, newest first.
    pub async fn list(&self) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, name, created_at FROM orders ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order = db.orders().create("Kitchen Miller").await.unwrap();

        let loaded = db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Kitchen Miller");
        assert!(db.orders().get("nope").await.unwrap().is_none());
        assert_eq!(db.orders().list().await.unwrap().len(), 1);
    }
}
