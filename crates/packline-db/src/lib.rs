//! # packline-db: Store, Lifecycle Engine and Scan Pipeline
//!
//! Everything in Packline that touches SQLite. It uses sqlx for async
//! access and runs each lifecycle operation in exactly one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Packline Data Flow                               │
//! │                                                                         │
//! │  Scanner line "AB1234\r\n" / packing UI action                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   packline-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌─────────────────┐   ┌───────────────┐   │   │
//! │  │   │ ScanPipeline │──►│ LifecycleEngine │──►│ UndoManager   │   │   │
//! │  │   │  (scan.rs)   │   │  (lifecycle/)   │   │  (undo.rs)    │   │   │
//! │  │   └──────────────┘   └────────┬────────┘   └───────────────┘   │   │
//! │  │                               │                                 │   │
//! │  │   ┌──────────────┐   ┌────────▼────────┐   ┌───────────────┐   │   │
//! │  │   │   Database   │   │  Repositories   │   │  Migrations   │   │   │
//! │  │   │  (pool.rs)   │◄──│  (repository/)  │   │  (embedded)   │   │   │
//! │  │   └──────────────┘   └─────────────────┘   └───────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - Read queries and the connection-level SQL the engine uses
//! - [`identity`] - Printed numbers and per-order sequence indices
//! - [`lifecycle`] - Package and pallet state machines, cascades, inverses
//! - [`scan`] - Scanner text to lifecycle action
//! - [`undo`] - Durable operation trail and the bounded undo stack
//! - [`config`] - `packline.toml` and environment overrides
//! - [`error`] - Store, engine and config error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use packline_db::{Database, ScanPipeline};
//! use packline_core::PackingMethod;
//!
//! let db = Database::new(DbConfig::new("line2.db")).await?;
//! let engine = db.engine();
//! let mut undo = engine.undo_manager(50);
//!
//! let package = engine.create_package(&mut undo, &order_id, PackingMethod::ByRoom, false).await?;
//! let pipeline = ScanPipeline::load(engine, &db.settings(), None).await?;
//! pipeline.scan(&mut undo, &package.id, "AB1234\r\n").await?;
//! undo.undo().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod scan;
pub mod undo;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, ConfigResult, PacklineConfig};
pub use error::{DbError, DbResult, EngineError, EngineResult};
pub use identity::IdentityGenerator;
pub use lifecycle::LifecycleEngine;
pub use pool::{Database, DbConfig};
pub use scan::{ScanOutcome, ScanPipeline};
pub use undo::{UndoEntry, UndoManager};

// Repository re-exports for convenience
pub use repository::cargo::CargoRepository;
pub use repository::component::ComponentRepository;
pub use repository::oplog::OperationLogRepository;
pub use repository::order::OrderRepository;
pub use repository::package::PackageRepository;
pub use repository::pallet::PalletRepository;
pub use repository::settings::SettingsRepository;
