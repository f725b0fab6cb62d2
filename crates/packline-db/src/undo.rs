//! # Undo / Audit Log
//!
//! Two records of every mutation:
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │  operation_log (SQLite)      │      │  UndoStack<UndoEntry>        │
//! │  append-only, unbounded      │      │  in memory, bounded (50)     │
//! │  written inside the tx       │      │  pushed after commit         │
//! │  audit + history             │      │  oldest entry dropped        │
//! └──────────────────────────────┘      └──────────────────────────────┘
//! ```
//!
//! `undo()` pops the newest entry and applies its inverse in one
//! transaction, then appends an `undo` entry to the trail. A conflicting
//! inverse rolls back and the popped entry is discarded; the trail keeps
//! the original record either way.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, EngineError, EngineResult};
use crate::lifecycle::{inverse, notify, Observers};
use crate::pool::begin_write;
use crate::repository::oplog::{self, OperationLogRepository};
use packline_core::{Operation, OperationLogEntry, UndoStack};

/// A durable log entry together with its decoded operation.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub entry: OperationLogEntry,
    pub operation: Operation,
}

/// Appends `op` to the trail on `conn` (normally an open transaction).
pub(crate) async fn journal(
    conn: &mut SqliteConnection,
    op: &Operation,
    description: &str,
) -> EngineResult<UndoEntry> {
    let payload = op.payload_json()?;
    let entry = oplog::append(conn, op.op_type(), &payload, description).await?;
    Ok(UndoEntry {
        entry,
        operation: op.clone(),
    })
}

/// Owner of one operator's undo stack.
///
/// Not shared: each scan station or session holds its own manager and passes
/// it by `&mut` to every engine call.
pub struct UndoManager {
    pool: SqlitePool,
    stack: UndoStack<UndoEntry>,
    observers: Observers,
}

impl std::fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoManager")
            .field("len", &self.stack.len())
            .field("capacity", &self.stack.capacity())
            .finish()
    }
}

impl UndoManager {
    pub fn new(pool: SqlitePool, capacity: usize) -> Self {
        UndoManager {
            pool,
            stack: UndoStack::new(capacity),
            observers: Vec::new(),
        }
    }

    pub(crate) fn with_observers(mut self, observers: Observers) -> Self {
        self.observers = observers;
        self
    }

    /// Writes an entry from its stored parts in a standalone transaction and
    /// pushes it if undoable.
    ///
    /// The payload must decode as `op_type`; anything else is rejected before
    /// the store is touched.
    pub async fn record(
        &mut self,
        op_type: &str,
        payload: &str,
        description: &str,
    ) -> EngineResult<OperationLogEntry> {
        let op = Operation::from_parts(op_type, payload)?;

        let mut tx = begin_write(&self.pool).await?;
        let recorded = journal(&mut tx, &op, description).await?;
        tx.commit().await.map_err(DbError::transaction)?;

        let entry = recorded.entry.clone();
        self.push_committed(vec![recorded]);
        Ok(entry)
    }

    /// Pushes entries whose transaction has committed. Audit-only entries
    /// stay off the stack.
    pub(crate) fn push_committed(&mut self, entries: Vec<UndoEntry>) {
        for recorded in entries {
            if !recorded.operation.is_undoable() {
                continue;
            }
            if let Some(dropped) = self.stack.push(recorded) {
                debug!(entry_id = %dropped.entry.id, "Undo stack full, dropped oldest entry");
            }
        }
    }

    /// Reverts the most recent undoable operation.
    ///
    /// Returns `Ok(None)` when there is nothing to undo.
    pub async fn undo(&mut self) -> EngineResult<Option<UndoEntry>> {
        if self.stack.is_empty() {
            return Ok(None);
        }

        // Begin before popping: an unavailable store leaves the stack intact.
        let mut tx = begin_write(&self.pool).await?;
        let Some(top) = self.stack.pop() else {
            return Ok(None);
        };

        let events = match inverse::revert(&mut tx, &top.operation).await {
            Ok(events) => events,
            Err(EngineError::Rule(rule)) => {
                warn!(
                    entry_id = %top.entry.id,
                    op_type = %top.entry.op_type,
                    error = %rule,
                    "Undo conflict, entry discarded"
                );
                return Err(EngineError::Rule(rule));
            }
            Err(other) => {
                self.stack.push(top);
                return Err(other);
            }
        };

        let audit = Operation::Undo {
            entry_id: top.entry.id.clone(),
            op_type: top.entry.op_type.clone(),
        };
        let description = format!("Undo: {}", top.entry.description);
        let committed = match journal(&mut tx, &audit, &description).await {
            Ok(_) => tx.commit().await.map_err(|e| EngineError::from(DbError::transaction(e))),
            Err(e) => Err(e),
        };
        if let Err(e) = committed {
            self.stack.push(top);
            return Err(e);
        }

        info!(op_type = %top.entry.op_type, "Operation undone");
        notify(&self.observers, &events);
        Ok(Some(top))
    }

    /// The durable trail, newest first.
    pub async fn history(&self, limit: u32) -> EngineResult<Vec<OperationLogEntry>> {
        Ok(OperationLogRepository::new(self.pool.clone()).recent(limit).await?)
    }

    /// The entry `undo()` would revert next.
    pub fn peek(&self) -> Option<&UndoEntry> {
        self.stack.peek()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }

    /// Forgets every pending undo. The durable trail is untouched.
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}
