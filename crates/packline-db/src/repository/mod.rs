//! # Repository Module
//!
//! SQL for every table, in one place.
//!
//! ## Two Entry Points per Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Read-only callers (UI, reports)          Lifecycle engine              │
//! │       │                                        │                        │
//! │       │  db.packages().get(id)                 │  begin tx              │
//! │       ▼                                        ▼                        │
//! │  PackageRepository { pool }              package::fetch(&mut tx, id)    │
//! │       │  acquire conn                    package::update(&mut tx, ..)   │
//! │       └──────────────┬─────────────────────────┘                        │
//! │                      ▼                                                  │
//! │        pub(crate) fn xxx(conn: &mut SqliteConnection, ..)               │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │                 SQLite                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Repositories never mutate lifecycle state on their own; the `pub(crate)`
//! functions are only called from inside engine transactions.
//!
//! ## Status Decoding
//! Rows are read into `*Row` structs holding raw strings and converted with
//! `into_domain()`, which runs the core `FromStr` normalizer. An unknown
//! value becomes [`DbError::Corrupt`](crate::error::DbError::Corrupt).

pub mod cargo;
pub mod component;
pub mod oplog;
pub mod order;
pub mod package;
pub mod pallet;
pub mod settings;

use std::str::FromStr;

use crate::error::{DbError, DbResult};

/// Decodes a stored enum column through its normalizer.
pub(crate) fn decode<T: FromStr>(entity: &'static str, field: &'static str, raw: &str) -> DbResult<T> {
    raw.parse::<T>()
        .map_err(|_| DbError::corrupt(entity, field, raw))
}
