//! # Lifecycle Engine
//!
//! The only code that changes component, package and pallet state.
//!
//! ## One Operation, One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  engine.complete_package(&mut undo, id)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ─► load rows ─► rules::ensure_* ─► UPDATE ... ─► log entry       │
//! │       │                     │                                           │
//! │       │                     └── Err ─► drop tx (ROLLBACK), return Err   │
//! │       ▼                                                                 │
//! │  COMMIT ─► push undo stack ─► notify observers                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Nothing is pushed and no observer hears about a change that did not
//! commit.
//!
//! ## State Machines
//! ```text
//! Package:  open ──complete──► completed ──seal──► sealed
//!             ▲                   │                  │
//!             └──────reopen───────┘                  │
//!             └─────────────────unseal───────────────┘
//!
//! Pallet:   open ──seal──► sealed ──close──► closed
//!             ▲               │
//!             └────unseal─────┘
//! ```

mod cascade;
pub(crate) mod inverse;
mod package;
mod pallet;

#[cfg(test)]
mod tests;

pub(crate) use cascade::{cascade_package_delete, cascade_pallet_delete};
pub(crate) use package::{attach_in, complete_in};

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{DbError, EngineResult};
use crate::repository::{cargo, component, order, package as package_repo, pallet as pallet_repo};
use crate::pool::begin_write;
use crate::undo::{journal, UndoManager};
use packline_core::{
    Component, CoreError, LifecycleEvent, LifecycleObserver, Operation, Package, Pallet,
    VirtualItem,
};

pub(crate) type Observers = Vec<Arc<dyn LifecycleObserver>>;

/// Delivers committed events to every observer, in registration order.
pub(crate) fn notify(observers: &[Arc<dyn LifecycleObserver>], events: &[LifecycleEvent]) {
    for event in events {
        for observer in observers {
            observer.on_event(event);
        }
    }
}

/// Operations and events produced by one transaction, applied on commit.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    ops: Vec<(Operation, String)>,
    events: Vec<LifecycleEvent>,
}

impl Journal {
    pub(crate) fn log(&mut self, op: Operation, description: impl Into<String>) {
        self.ops.push((op, description.into()));
    }

    pub(crate) fn emit(&mut self, event: LifecycleEvent) {
        self.events.push(event);
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Transactional mutator of the containment hierarchy.
///
/// Every mutating method takes the caller's [`UndoManager`]: the operation
/// is written to the durable log inside the transaction and pushed onto that
/// manager's stack after commit.
#[derive(Clone)]
pub struct LifecycleEngine {
    pool: SqlitePool,
    observers: Observers,
}

impl fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl LifecycleEngine {
    pub fn new(pool: SqlitePool) -> Self {
        LifecycleEngine {
            pool,
            observers: Vec::new(),
        }
    }

    /// Registers an observer. Observers are called synchronously after each
    /// commit and cannot fail the operation.
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// An undo manager that reports reverted changes to this engine's
    /// observers.
    pub fn undo_manager(&self, capacity: usize) -> UndoManager {
        UndoManager::new(self.pool.clone(), capacity).with_observers(self.observers.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> EngineResult<Transaction<'static, Sqlite>> {
        Ok(begin_write(&self.pool).await?)
    }

    /// Logs the journal into `tx`, commits, then pushes and notifies.
    pub(crate) async fn commit(
        &self,
        mut tx: Transaction<'static, Sqlite>,
        undo: &mut UndoManager,
        journal_ops: Journal,
    ) -> EngineResult<()> {
        let mut entries = Vec::with_capacity(journal_ops.ops.len());
        for (op, description) in &journal_ops.ops {
            entries.push(journal(&mut tx, op, description).await?);
        }

        tx.commit().await.map_err(DbError::transaction)?;
        debug!(entries = entries.len(), "Lifecycle transaction committed");

        undo.push_committed(entries);
        notify(&self.observers, &journal_ops.events);
        Ok(())
    }
}

// =============================================================================
// Row Loaders
// =============================================================================
// Missing rows become the business-level NotFound variants.

pub(crate) async fn load_package(conn: &mut SqliteConnection, id: &str) -> EngineResult<Package> {
    package_repo::fetch(conn, id)
        .await?
        .ok_or_else(|| CoreError::PackageNotFound(id.to_string()).into())
}

pub(crate) async fn load_pallet(conn: &mut SqliteConnection, id: &str) -> EngineResult<Pallet> {
    pallet_repo::fetch(conn, id)
        .await?
        .ok_or_else(|| CoreError::PalletNotFound(id.to_string()).into())
}

pub(crate) async fn load_component(conn: &mut SqliteConnection, id: &str) -> EngineResult<Component> {
    component::fetch(conn, id)
        .await?
        .ok_or_else(|| CoreError::ComponentNotFound(id.to_string()).into())
}

pub(crate) async fn load_cargo(conn: &mut SqliteConnection, id: &str) -> EngineResult<VirtualItem> {
    cargo::fetch(conn, id)
        .await?
        .ok_or_else(|| CoreError::CargoNotFound(id.to_string()).into())
}

pub(crate) async fn ensure_order(conn: &mut SqliteConnection, order_id: &str) -> EngineResult<()> {
    if !order::exists(conn, order_id).await? {
        return Err(CoreError::OrderNotFound(order_id.to_string()).into());
    }
    Ok(())
}

/// Printed number of the pallet a package sits on, for error messages.
pub(crate) async fn pallet_number_of(
    conn: &mut SqliteConnection,
    package: &Package,
) -> EngineResult<Option<String>> {
    match &package.pallet_id {
        None => Ok(None),
        Some(pallet_id) => Ok(Some(
            pallet_repo::fetch(conn, pallet_id)
                .await?
                .map(|p| p.pallet_number)
                .unwrap_or_else(|| pallet_id.clone()),
        )),
    }
}
