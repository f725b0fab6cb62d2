//! # Identity Generator
//!
//! Allocates printed numbers and per-order sequence indices against the
//! store.
//!
//! ## Allocation Inside the Creating Transaction
//! ```text
//! begin tx
//!   │
//!   ├─ format = settings numbering.*
//!   ├─ seq    = count(numbers with today's prefix) + 1
//!   ├─ while number(seq) exists: seq += 1        ← collision retry
//!   ├─ index  = smallest free index of the order ← gap filling
//!   ├─ INSERT package / pallet
//!   │
//! commit   ← number and index are spent only here
//! ```
//! A rolled-back creation leaves nothing behind, so the next attempt reuses
//! the same candidate.

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::{package, pallet, settings};
use packline_core::identity::{smallest_free_index, NumberFormat};

/// The calendar date numbers are stamped with.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn counter(count: i64) -> DbResult<u32> {
    u32::try_from(count + 1).map_err(|_| DbError::Internal(format!("number counter overflow at {count}")))
}

pub(crate) async fn new_package_number(
    conn: &mut SqliteConnection,
    format: &NumberFormat,
    date: NaiveDate,
) -> DbResult<String> {
    let prefix = format.package_day_prefix(date);
    let mut seq = counter(package::count_numbered(conn, &prefix).await?)?;

    loop {
        let candidate = format.package_number(date, seq);
        if !package::number_taken(conn, &candidate).await? {
            debug!(number = %candidate, "Allocated package number");
            return Ok(candidate);
        }
        seq = seq
            .checked_add(1)
            .ok_or_else(|| DbError::Internal("package number space exhausted".to_string()))?;
    }
}

pub(crate) async fn new_pallet_number(
    conn: &mut SqliteConnection,
    format: &NumberFormat,
    is_virtual: bool,
    date: NaiveDate,
) -> DbResult<String> {
    let prefix = format.pallet_day_prefix(is_virtual, date);
    let mut seq = counter(pallet::count_numbered(conn, &prefix).await?)?;

    loop {
        let candidate = format.pallet_number(is_virtual, date, seq);
        if !pallet::number_taken(conn, &candidate).await? {
            debug!(number = %candidate, is_virtual, "Allocated pallet number");
            return Ok(candidate);
        }
        seq = seq
            .checked_add(1)
            .ok_or_else(|| DbError::Internal("pallet number space exhausted".to_string()))?;
    }
}

pub(crate) async fn next_package_index(conn: &mut SqliteConnection, order_id: &str) -> DbResult<i64> {
    Ok(smallest_free_index(package::used_indices(conn, order_id).await?))
}

pub(crate) async fn next_pallet_index(conn: &mut SqliteConnection, order_id: &str) -> DbResult<i64> {
    Ok(smallest_free_index(pallet::used_indices(conn, order_id).await?))
}

/// Read-only view of the next identifiers, for labels and previews.
///
/// Values returned here are not reserved; the lifecycle engine allocates
/// again inside its own transaction.
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    pool: SqlitePool,
}

impl IdentityGenerator {
    pub fn new(pool: SqlitePool) -> Self {
        IdentityGenerator { pool }
    }

    pub async fn new_package_number(&self) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        let format = settings::number_format(&mut conn).await?;
        new_package_number(&mut conn, &format, today()).await
    }

    pub async fn new_pallet_number(&self, is_virtual: bool) -> DbResult<String> {
        let mut conn = self.pool.acquire().await?;
        let format = settings::number_format(&mut conn).await?;
        new_pallet_number(&mut conn, &format, is_virtual, today()).await
    }

    pub async fn next_package_index(&self, order_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        next_package_index(&mut conn, order_id).await
    }

    pub async fn next_pallet_index(&self, order_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        next_pallet_index(&mut conn, order_id).await
    }
}
