//! # Error Types
//!
//! Domain-specific error types for packline-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  packline-core errors (this file)                                      │
//! │  ├── CoreError        - Business-rule violations (recoverable)         │
//! │  └── ValidationError  - Input / configuration validation failures      │
//! │                                                                         │
//! │  packline-db errors (separate crate)                                   │
//! │  ├── DbError          - Store failures (StoreUnavailable, ...)         │
//! │  └── EngineError      - CoreError | DbError, what callers see          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → operator message    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Business-rule errors are detected before any mutation
//! 2. Every variant carries what the operator needs to self-correct
//!    (package number, the label that disagreed, ...)
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::types::{PackageStatus, PackingMethod, PalletStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Business-rule violations raised by the lifecycle engine and scan pipeline.
///
/// All of these are recoverable: the transaction that detected them is rolled
/// back and the store is exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Scanned text resolved to a code that matches no component.
    ///
    /// ## User Workflow
    /// ```text
    /// Scanner: "AB1234" ──strip-prefix(2)──► "1234"
    ///      │
    ///      ▼
    /// lookup component "1234" ── none ──► InvalidScan("1234")
    ///      │
    ///      ▼
    /// UI shows: "Unknown code 1234"
    /// ```
    #[error("Invalid scan: no component with code '{0}'")]
    InvalidScan(String),

    /// The scanned component is already in a package.
    #[error("Component {code} was already scanned into package {package_number}")]
    DuplicateScan {
        code: String,
        package_number: String,
    },

    /// The component's room/cabinet label disagrees with the package members.
    #[error(
        "Package {package_number} is packed {method}: {field} must be '{expected}', component has '{found}'"
    )]
    MethodMismatch {
        package_number: String,
        method: PackingMethod,
        field: String,
        expected: String,
        found: String,
    },

    /// Attach was requested for a component that already has a package.
    #[error("Component {code} is already packed in package {package_number}")]
    AlreadyPacked {
        code: String,
        package_number: String,
    },

    /// Detach was requested for a component that has no package.
    #[error("Component {code} is not packed")]
    NotPacked { code: String },

    /// A package with no components cannot be completed.
    #[error("Package {package_number} has no components and cannot be completed")]
    EmptyPackage { package_number: String },

    /// Components can only be added to / removed from open packages that are
    /// not on a pallet.
    #[error("Package {package_number} is {status}; its components cannot be changed")]
    PackageSealed {
        package_number: String,
        status: PackageStatus,
    },

    /// The package sits on a pallet, which blocks the requested change.
    #[error("Package {package_number} is on pallet {pallet_number}; remove it from the pallet first")]
    PalletAssigned {
        package_number: String,
        pallet_number: String,
    },

    /// The package is not on any pallet.
    #[error("Package {package_number} is not on a pallet")]
    NotOnPallet { package_number: String },

    /// Only completed or sealed packages may go on a pallet.
    #[error("Package {package_number} is {status}; complete it before putting it on a pallet")]
    PackageNotSealable {
        package_number: String,
        status: PackageStatus,
    },

    /// The pallet does not accept membership changes in its current state.
    #[error("Pallet {pallet_number} is {status}")]
    PalletNotOpen {
        pallet_number: String,
        status: PalletStatus,
    },

    /// Entities from different orders cannot be combined.
    #[error("{entity} {number} belongs to order {found}, expected order {expected}")]
    OrderMismatch {
        entity: &'static str,
        number: String,
        expected: String,
        found: String,
    },

    /// The state machine has no such transition from the current state.
    #[error("Cannot {action} {entity} {number} while it is {from}")]
    InvalidTransition {
        entity: &'static str,
        number: String,
        from: String,
        action: &'static str,
    },

    /// A recorded inverse could not be applied (target changed or vanished).
    #[error("Cannot undo {op_type}: {reason}")]
    UndoConflict { op_type: String, reason: String },

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Pallet not found: {0}")]
    PalletNotFound(String),

    #[error("Cargo item not found: {0}")]
    CargoNotFound(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an UndoConflict error.
    pub fn undo_conflict(op_type: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::UndoConflict {
            op_type: op_type.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for operator input (cargo entries) and for scan profiles, which are
/// validated once when loaded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. malformed scan profile JSON).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
