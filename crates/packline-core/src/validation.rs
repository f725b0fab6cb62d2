//! # Validation Module
//!
//! Input validation for operator-entered data.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Packing UI                                                   │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Lifecycle engine                                             │
//! │  ├── THIS MODULE: cargo entries, labels                                │
//! │  └── rules.rs: state-machine preconditions                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── UNIQUE component code, package_number, pallet_number              │
//! │  ├── UNIQUE (order_id, sequence_index) per packages / pallets          │
//! │  └── Foreign keys                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use packline_core::validation::{validate_cargo_name, validate_cargo_quantity};
//!
//! validate_cargo_name("Hinge set").unwrap();
//! validate_cargo_quantity(2.5).unwrap();
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest cargo name accepted.
pub const MAX_CARGO_NAME_LEN: usize = 100;

/// Longest unit label accepted (`pcs`, `box`, `m`, ...).
pub const MAX_UNIT_LEN: usize = 16;

// =============================================================================
// String Validators
// =============================================================================

fn required_trimmed<'a>(value: &'a str, field: &str, max: usize) -> ValidationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value)
}

/// Validates a cargo item name and returns it trimmed.
///
/// ## Example
/// ```rust
/// use packline_core::validation::validate_cargo_name;
///
/// assert_eq!(validate_cargo_name("  Manuals ").unwrap(), "Manuals");
/// assert!(validate_cargo_name("   ").is_err());
/// ```
pub fn validate_cargo_name(name: &str) -> ValidationResult<&str> {
    required_trimmed(name, "cargo name", MAX_CARGO_NAME_LEN)
}

/// Validates a unit label and returns it trimmed.
pub fn validate_unit(unit: &str) -> ValidationResult<&str> {
    required_trimmed(unit, "unit", MAX_UNIT_LEN)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Cargo quantities are fractional (metres of edge band, kg of screws) but
/// must be finite and strictly positive.
pub fn validate_cargo_quantity(quantity: f64) -> ValidationResult<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
