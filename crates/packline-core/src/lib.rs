//! # packline-core: Pure Domain Logic for Packline
//!
//! Entities, statuses, lifecycle rules, scan transformations and the bounded
//! undo stack for a furniture-production packing station. Nothing in this
//! crate touches the database or the scanner.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Packline Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Packing UI / label designer / reports                │   │
//! │  │              (observers of lifecycle events)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    packline-db                                  │   │
//! │  │   ScanPipeline ──► LifecycleEngine ──► UndoManager ──► SQLite   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ packline-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  rules  │ │   scan   │ │identity │ │  undo  │  │   │
//! │  │   │ Package │ │ ensure_*│ │Transform │ │ indices │ │ Stack  │  │   │
//! │  │   │ Pallet  │ │ method  │ │ Config   │ │ numbers │ │ Ops    │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO SCANNER • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities and status enums with legacy-alias decoding
//! - [`rules`] - Preconditions for every lifecycle transition
//! - [`scan`] - Scanner text transformations and scan profiles
//! - [`identity`] - Gap-filling indices and printed number formats
//! - [`operation`] - Logged operations and their payloads
//! - [`undo`] - Bounded LIFO undo stack
//! - [`events`] - Lifecycle events and the observer trait
//! - [`validation`] - Operator input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use packline_core::scan::{ScanConfig, ScanTransform};
//!
//! let profile = ScanConfig {
//!     name: "line-2".to_string(),
//!     transform: ScanTransform::StripPrefix { n: 2 },
//!     finish_code: Some("FINISH".to_string()),
//! };
//!
//! assert_eq!(profile.resolve(" AB1234\r\n"), "1234");
//! assert!(profile.is_finish_code(&profile.resolve("ABFINISH")));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod events;
pub mod identity;
pub mod operation;
pub mod rules;
pub mod scan;
pub mod types;
pub mod undo;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use events::{LifecycleEvent, LifecycleObserver};
pub use identity::NumberFormat;
pub use operation::{Operation, PalletMember};
pub use scan::{ScanConfig, ScanTransform};
pub use types::*;
pub use undo::{UndoStack, DEFAULT_UNDO_CAPACITY};
