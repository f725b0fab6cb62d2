//! # Logged Operations
//!
//! Every lifecycle mutation is described by an [`Operation`]. The operation is
//! written to the durable trail as `(op_type, payload)` and, if undoable,
//! pushed onto the undo stack. The payload carries exactly what the inverse
//! needs, including snapshots for destructive operations.
//!
//! ## Stored Shape
//! ```text
//! op_type = "add_package_to_pallet"
//! payload = {"pallet_id":"…","package_id":"…","previous_status":"completed"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{Package, PackageStatus, Pallet, VirtualItem};

/// A package's membership on a pallet at the time it was snapshotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalletMember {
    pub package_id: String,
    pub status: PackageStatus,
}

/// A reversible (or audit-only) lifecycle mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op_type", content = "payload", rename_all = "snake_case")]
pub enum Operation {
    ScanComponent {
        component_id: String,
        package_id: String,
    },
    /// Direct (non-scanner) attach. Audit-only: reverted together with its
    /// package by the `create_package` inverse.
    AttachComponent {
        component_id: String,
        package_id: String,
    },
    DetachComponent {
        component_id: String,
        package_id: String,
    },
    CreatePackage {
        package_id: String,
    },
    CompletePackage {
        package_id: String,
    },
    ReopenPackage {
        package_id: String,
    },
    SealPackage {
        package_id: String,
    },
    UnsealPackage {
        package_id: String,
    },
    DeletePackage {
        package: Package,
        component_ids: Vec<String>,
    },
    CreatePallet {
        pallet_id: String,
    },
    AddPackageToPallet {
        pallet_id: String,
        package_id: String,
        previous_status: PackageStatus,
    },
    RemovePackageFromPallet {
        pallet_id: String,
        package_id: String,
        previous_status: PackageStatus,
    },
    SealPallet {
        pallet_id: String,
    },
    UnsealPallet {
        pallet_id: String,
    },
    ClosePallet {
        pallet_id: String,
    },
    DeletePallet {
        pallet: Pallet,
        members: Vec<PalletMember>,
        cargo: Vec<VirtualItem>,
    },
    AddCargo {
        item: VirtualItem,
    },
    RemoveCargo {
        item: VirtualItem,
    },
    /// Audit record of a successful undo.
    Undo {
        entry_id: String,
        op_type: String,
    },
}

impl Operation {
    /// The `op_type` column value.
    pub fn op_type(&self) -> &'static str {
        match self {
            Operation::ScanComponent { .. } => "scan_component",
            Operation::AttachComponent { .. } => "attach_component",
            Operation::DetachComponent { .. } => "detach_component",
            Operation::CreatePackage { .. } => "create_package",
            Operation::CompletePackage { .. } => "complete_package",
            Operation::ReopenPackage { .. } => "reopen_package",
            Operation::SealPackage { .. } => "seal_package",
            Operation::UnsealPackage { .. } => "unseal_package",
            Operation::DeletePackage { .. } => "delete_package",
            Operation::CreatePallet { .. } => "create_pallet",
            Operation::AddPackageToPallet { .. } => "add_package_to_pallet",
            Operation::RemovePackageFromPallet { .. } => "remove_package_from_pallet",
            Operation::SealPallet { .. } => "seal_pallet",
            Operation::UnsealPallet { .. } => "unseal_pallet",
            Operation::ClosePallet { .. } => "close_pallet",
            Operation::DeletePallet { .. } => "delete_pallet",
            Operation::AddCargo { .. } => "add_cargo",
            Operation::RemoveCargo { .. } => "remove_cargo",
            Operation::Undo { .. } => "undo",
        }
    }

    /// Whether the operation goes onto the undo stack.
    pub fn is_undoable(&self) -> bool {
        !matches!(
            self,
            Operation::AttachComponent { .. } | Operation::Undo { .. }
        )
    }

    /// Serializes the variant's fields (without the tag).
    pub fn payload_json(&self) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        let payload = value
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);
        serde_json::to_string(&payload)
    }

    /// Rebuilds an operation from its stored columns.
    pub fn from_parts(op_type: &str, payload: &str) -> serde_json::Result<Self> {
        let payload: Value = serde_json::from_str(payload)?;
        serde_json::from_value(json!({ "op_type": op_type, "payload": payload }))
    }
}
