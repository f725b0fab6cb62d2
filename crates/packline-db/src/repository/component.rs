//! # Component Repository
//!
//! Cut parts. Rows are created by the import collaborator through
//! [`ComponentRepository::insert`]; after that only the lifecycle engine
//! writes `package_id`, `status` and `scanned_at`, and always all three
//! together so that `status = packed ⇔ package_id ≠ null` holds.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::decode;
use crate::error::DbResult;
use packline_core::{Component, ComponentStatus};

const COLUMNS: &str = "id, order_id, code, name, material, length_mm, width_mm, thickness_mm, \
                       room, cabinet, package_id, status, scanned_at, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ComponentRow {
    id: String,
    order_id: String,
    code: String,
    name: String,
    material: Option<String>,
    length_mm: f64,
    width_mm: f64,
    thickness_mm: f64,
    room: Option<String>,
    cabinet: Option<String>,
    package_id: Option<String>,
    status: String,
    scanned_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ComponentRow {
    fn into_domain(self) -> DbResult<Component> {
        Ok(Component {
            status: decode("component", "status", &self.status)?,
            id: self.id,
            order_id: self.order_id,
            code: self.code,
            name: self.name,
            material: self.material,
            length_mm: self.length_mm,
            width_mm: self.width_mm,
            thickness_mm: self.thickness_mm,
            room: self.room,
            cabinet: self.cabinet,
            package_id: self.package_id,
            scanned_at: self.scanned_at,
            created_at: self.created_at,
        })
    }
}

fn decode_all(rows: Vec<ComponentRow>) -> DbResult<Vec<Component>> {
    rows.into_iter().map(ComponentRow::into_domain).collect()
}

// =============================================================================
// Connection-Level Operations
// =============================================================================

pub(crate) async fn insert(conn: &mut SqliteConnection, c: &Component) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO components (
            id, order_id, code, name, material, length_mm, width_mm, thickness_mm,
            room, cabinet, package_id, status, scanned_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
    )
    .bind(&c.id)
    .bind(&c.order_id)
    .bind(&c.code)
    .bind(&c.name)
    .bind(&c.material)
    .bind(c.length_mm)
    .bind(c.width_mm)
    .bind(c.thickness_mm)
    .bind(&c.room)
    .bind(&c.cabinet)
    .bind(&c.package_id)
    .bind(c.status.as_str())
    .bind(c.scanned_at)
    .bind(c.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Component>> {
    let sql = format!("SELECT {COLUMNS} FROM components WHERE id = ?1");
    let row = sqlx::query_as::<_, ComponentRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(ComponentRow::into_domain).transpose()
}

/// Looks a code up within one order. Codes are globally unique, so this
/// returns `None` both for unknown codes and for another order's parts.
pub(crate) async fn fetch_by_code_in_order(
    conn: &mut SqliteConnection,
    order_id: &str,
    code: &str,
) -> DbResult<Option<Component>> {
    let sql = format!("SELECT {COLUMNS} FROM components WHERE code = ?1 AND order_id = ?2");
    let row = sqlx::query_as::<_, ComponentRow>(&sql)
        .bind(code)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(ComponentRow::into_domain).transpose()
}

pub(crate) async fn members(conn: &mut SqliteConnection, package_id: &str) -> DbResult<Vec<Component>> {
    let sql = format!("SELECT {COLUMNS} FROM components WHERE package_id = ?1 ORDER BY code");
    let rows = sqlx::query_as::<_, ComponentRow>(&sql)
        .bind(package_id)
        .fetch_all(&mut *conn)
        .await?;
    decode_all(rows)
}

/// Any one member of the package. All members agree on the packing-method
/// labels, so one is enough to check a newcomer against.
pub(crate) async fn any_member(
    conn: &mut SqliteConnection,
    package_id: &str,
) -> DbResult<Option<Component>> {
    let sql = format!("SELECT {COLUMNS} FROM components WHERE package_id = ?1 LIMIT 1");
    let row = sqlx::query_as::<_, ComponentRow>(&sql)
        .bind(package_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(ComponentRow::into_domain).transpose()
}

pub(crate) async fn set_packed(
    conn: &mut SqliteConnection,
    id: &str,
    package_id: &str,
    scanned_at: Option<DateTime<Utc>>,
) -> DbResult<()> {
    debug!(component_id = %id, package_id = %package_id, "Marking component packed");

    sqlx::query(
        "UPDATE components SET package_id = ?2, status = ?3, scanned_at = ?4 WHERE id = ?1",
    )
    .bind(id)
    .bind(package_id)
    .bind(ComponentStatus::Packed.as_str())
    .bind(scanned_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn set_pending(conn: &mut SqliteConnection, id: &str) -> DbResult<()> {
    debug!(component_id = %id, "Marking component pending");

    sqlx::query(
        "UPDATE components SET package_id = NULL, status = ?2, scanned_at = NULL WHERE id = ?1",
    )
    .bind(id)
    .bind(ComponentStatus::Pending.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Returns every member of the package to pending and reports which ones
/// moved.
pub(crate) async fn release_all(conn: &mut SqliteConnection, package_id: &str) -> DbResult<Vec<String>> {
    let ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM components WHERE package_id = ?1 ORDER BY code")
            .bind(package_id)
            .fetch_all(&mut *conn)
            .await?;

    sqlx::query(
        "UPDATE components SET package_id = NULL, status = ?2, scanned_at = NULL WHERE package_id = ?1",
    )
    .bind(package_id)
    .bind(ComponentStatus::Pending.as_str())
    .execute(&mut *conn)
    .await?;

    debug!(package_id = %package_id, released = ids.len(), "Released package members");
    Ok(ids)
}

// =============================================================================
// Repository
// =============================================================================

/// Read access to components, plus the import entry point.
#[derive(Debug, Clone)]
pub struct ComponentRepository {
    pool: SqlitePool,
}

impl ComponentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ComponentRepository { pool }
    }

    /// Inserts an imported component. Import always yields unpacked parts, so
    /// any package link on the input is ignored.
    pub async fn insert(&self, component: &Component) -> DbResult<()> {
        debug!(code = %component.code, order_id = %component.order_id, "Importing component");

        let mut fresh = component.clone();
        fresh.package_id = None;
        fresh.status = ComponentStatus::Pending;
        fresh.scanned_at = None;

        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, &fresh).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Component>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Component>> {
        let sql = format!("SELECT {COLUMNS} FROM components WHERE code = ?1");
        let row = sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ComponentRow::into_domain).transpose()
    }

    pub async fn list_by_order(&self, order_id: &str) -> DbResult<Vec<Component>> {
        let sql = format!("SELECT {COLUMNS} FROM components WHERE order_id = ?1 ORDER BY code");
        let rows = sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }

    /// Members of a package.
    pub async fn list_by_package(&self, package_id: &str) -> DbResult<Vec<Component>> {
        let mut conn = self.pool.acquire().await?;
        members(&mut conn, package_id).await
    }

    /// Components of the order not yet in any package.
    pub async fn list_pending(&self, order_id: &str) -> DbResult<Vec<Component>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM components WHERE order_id = ?1 AND package_id IS NULL ORDER BY code"
        );
        let rows = sqlx::query_as::<_, ComponentRow>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }

    pub async fn count_pending(&self, order_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM components WHERE order_id = ?1 AND package_id IS NULL",
        )
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn part(order_id: &str, code: &str) -> Component {
        Component {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            code: code.to_string(),
            name: "Door".to_string(),
            material: Some("Oak 19".to_string()),
            length_mm: 716.0,
            width_mm: 396.0,
            thickness_mm: 19.0,
            room: Some("Kitchen".to_string()),
            cabinet: Some("K1".to_string()),
            package_id: None,
            status: ComponentStatus::Pending,
            scanned_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order = db.orders().create("O-1").await.unwrap();
        let c = part(&order.id, "1234");
        db.components().insert(&c).await.unwrap();

        assert_eq!(db.components().get(&c.id).await.unwrap().unwrap().code, "1234");
        assert_eq!(db.components().get_by_code("1234").await.unwrap().unwrap().id, c.id);
        assert_eq!(db.components().count_pending(&order.id).await.unwrap(), 1);
        assert_eq!(db.components().list_pending(&order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order = db.orders().create("O-1").await.unwrap();
        db.components().insert(&part(&order.id, "1234")).await.unwrap();

        let err = db.components().insert(&part(&order.id, "1234")).await.unwrap_err();
        assert!(matches!(err, crate::error::DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_legacy_status_is_normalized() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let order = db.orders().create("O-1").await.unwrap();
        let c = part(&order.id, "77");
        db.components().insert(&c).await.unwrap();

        sqlx::query("UPDATE components SET status = 'unpacked' WHERE id = ?1")
            .bind(&c.id)
            .execute(db.pool())
            .await
            .unwrap();
        let loaded = db.components().get(&c.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ComponentStatus::Pending);

        sqlx::query("UPDATE components SET status = 'teleported' WHERE id = ?1")
            .bind(&c.id)
            .execute(db.pool())
            .await
            .unwrap();
        let err = db.components().get(&c.id).await.unwrap_err();
        assert!(matches!(err, crate::error::DbError::Corrupt { field: "status", .. }));
    }
}
