//! # Domain Types
//!
//! Core domain types used throughout Packline.
//!
//! ## Containment Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Order (external reference)                                            │
//! │    │                                                                    │
//! │    ├── Component ──package_id──► Package ──pallet_id──► Pallet          │
//! │    │   code (business)           package_number         pallet_number  │
//! │    │   room / cabinet            sequence_index         sequence_index │
//! │    │   status: pending|packed    status: open|          status: open|  │
//! │    │                                     completed|             sealed|│
//! │    │                                     sealed                 closed │
//! │    │                                                                    │
//! │    └── VirtualItem (non-component cargo on a pallet)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (code, package_number, pallet_number) - printed on labels
//!
//! ## Status Normalization
//! Stored status strings are decoded through a single [`FromStr`] per enum.
//! Legacy spellings (e.g. `"packed"` for a sealed package) are folded into the
//! canonical variant there, so nothing else ever branches on raw strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

/// Folds case, surrounding whitespace and `-`/space separators so that
/// `"In-Progress"` and `"in_progress"` compare equal.
fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace(['-', ' '], "_")
}

fn unknown(field: &str, raw: &str, allowed: &[&str]) -> ValidationError {
    ValidationError::NotAllowed {
        field: format!("{field} '{raw}'"),
        allowed: allowed.iter().map(|s| s.to_string()).collect(),
    }
}

// =============================================================================
// Component Status
// =============================================================================

/// Whether a component has been put into a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// Waiting to be packed.
    #[default]
    Pending,
    /// Attached to a package.
    Packed,
}

impl ComponentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Pending => "pending",
            ComponentStatus::Packed => "packed",
        }
    }
}

impl FromStr for ComponentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" | "new" | "unpacked" => Ok(ComponentStatus::Pending),
            "packed" | "scanned" => Ok(ComponentStatus::Packed),
            _ => Err(unknown("component status", s, &["pending", "packed"])),
        }
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Package Status
// =============================================================================

/// Package lifecycle state.
///
/// ```text
///            complete            seal
///   open ───────────────► completed ──────► sealed
///    ▲  ◄───────────────     │                 │
///    │       reopen          │                 │
///    └───────────────────────┴─────────────────┘
///                        unseal (sealed → open, direct)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    /// Accepting components.
    #[default]
    Open,
    /// Closed for components, ready for a pallet.
    Completed,
    /// Taped and labelled; auto-applied when put on a pallet.
    Sealed,
}

impl PackageStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Open => "open",
            PackageStatus::Completed => "completed",
            PackageStatus::Sealed => "sealed",
        }
    }

    /// Statuses a package may have while it sits on a pallet.
    pub const fn is_palletizable(&self) -> bool {
        matches!(self, PackageStatus::Completed | PackageStatus::Sealed)
    }
}

impl FromStr for PackageStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "open" | "in_progress" => Ok(PackageStatus::Open),
            "completed" | "complete" | "done" => Ok(PackageStatus::Completed),
            // Older databases wrote "packed" for sealed packages.
            "sealed" | "packed" => Ok(PackageStatus::Sealed),
            _ => Err(unknown("package status", s, &["open", "completed", "sealed"])),
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Pallet Status
// =============================================================================

/// Pallet lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PalletStatus {
    /// Packages can be added and removed.
    #[default]
    Open,
    /// Wrapped; membership frozen until unsealed.
    Sealed,
    /// Dispatched. Terminal.
    Closed,
}

impl PalletStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PalletStatus::Open => "open",
            PalletStatus::Sealed => "sealed",
            PalletStatus::Closed => "closed",
        }
    }
}

impl FromStr for PalletStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "open" => Ok(PalletStatus::Open),
            "sealed" => Ok(PalletStatus::Sealed),
            "closed" | "shipped" => Ok(PalletStatus::Closed),
            _ => Err(unknown("pallet status", s, &["open", "sealed", "closed"])),
        }
    }
}

impl fmt::Display for PalletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Packing Method
// =============================================================================

/// How components are grouped into a package.
///
/// ## Consistency Rules
/// - `ByRoom`: every member shares the same room label
/// - `ByCabinet`: every member shares the same room AND cabinet label
/// - `Mixed`: no constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PackingMethod {
    ByRoom,
    ByCabinet,
    #[default]
    Mixed,
}

impl PackingMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PackingMethod::ByRoom => "by_room",
            PackingMethod::ByCabinet => "by_cabinet",
            PackingMethod::Mixed => "mixed",
        }
    }
}

impl FromStr for PackingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "by_room" | "room" => Ok(PackingMethod::ByRoom),
            "by_cabinet" | "cabinet" => Ok(PackingMethod::ByCabinet),
            "mixed" | "any" => Ok(PackingMethod::Mixed),
            _ => Err(unknown("packing method", s, &["by_room", "by_cabinet", "mixed"])),
        }
    }
}

impl fmt::Display for PackingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// Reference to an order owned by the order-management collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Component
// =============================================================================

/// A single physical cut part.
///
/// Created by the import collaborator; only the lifecycle engine changes
/// `package_id`, `status` and `scanned_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Component {
    pub id: String,
    pub order_id: String,
    /// Barcode printed on the part. Unique and immutable.
    pub code: String,
    pub name: String,
    pub material: Option<String>,
    pub length_mm: f64,
    pub width_mm: f64,
    pub thickness_mm: f64,
    pub room: Option<String>,
    pub cabinet: Option<String>,
    pub package_id: Option<String>,
    pub status: ComponentStatus,
    #[ts(as = "Option<String>")]
    pub scanned_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Component {
    /// Checks `status = packed ⇔ package_id ≠ null`.
    pub fn is_consistent(&self) -> bool {
        (self.status == ComponentStatus::Packed) == self.package_id.is_some()
    }

    #[inline]
    pub fn is_packed(&self) -> bool {
        self.package_id.is_some()
    }
}

// =============================================================================
// Package
// =============================================================================

/// A group of components shipped as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Package {
    pub id: String,
    pub order_id: String,
    /// Printed number, e.g. `20261016-0007`.
    pub package_number: String,
    /// Operator-facing "package N of M". Gap-filling per order.
    pub sequence_index: i64,
    pub pallet_id: Option<String>,
    pub packing_method: PackingMethod,
    pub status: PackageStatus,
    /// Created by hand rather than by the scan workflow.
    pub is_manual: bool,
    /// Cached member count, kept in step by the engine.
    pub component_count: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub sealed_at: Option<DateTime<Utc>>,
}

impl Package {
    #[inline]
    pub fn is_on_pallet(&self) -> bool {
        self.pallet_id.is_some()
    }
}

// =============================================================================
// Pallet
// =============================================================================

/// A group of packages (plus optional cargo) for consolidated dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Pallet {
    pub id: String,
    pub order_id: String,
    /// `T…` for physical pallets, `VT…` for virtual ones.
    pub pallet_number: String,
    pub sequence_index: i64,
    pub is_virtual: bool,
    pub status: PalletStatus,
    #[ts(as = "Option<String>")]
    pub sealed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Non-component cargo loaded on a pallet (hardware boxes, manuals, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VirtualItem {
    pub id: String,
    pub pallet_id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Join row between a pallet and a package. Informational only; the
/// authoritative link is `Package::pallet_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PalletPackage {
    pub pallet_id: String,
    pub package_id: String,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

// =============================================================================
// Operation Log
// =============================================================================

/// An immutable entry in the durable operation trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OperationLogEntry {
    pub id: String,
    /// `scan_component`, `create_package`, `seal_pallet`, ...
    pub op_type: String,
    /// JSON payload the inverse needs.
    pub payload: String,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
