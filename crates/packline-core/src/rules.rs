//! # Lifecycle Rules
//!
//! Pure precondition checks for every lifecycle transition. The engine loads
//! the rows inside its transaction, calls the matching `ensure_*` function,
//! and only mutates when it returns `Ok`. Keeping the rules here means each
//! one is testable without a database.
//!
//! ## Package Transitions
//! ```text
//! ┌──────────────┬────────────┬──────────────────────────────────────────┐
//! │ action       │ from       │ extra precondition                       │
//! ├──────────────┼────────────┼──────────────────────────────────────────┤
//! │ attach/detach│ open       │ not on a pallet                          │
//! │ complete     │ open       │ component_count > 0                      │
//! │ reopen       │ completed  │ not on a pallet                          │
//! │ seal         │ completed  │ -                                        │
//! │ unseal       │ sealed     │ not on a pallet (goes straight to open)  │
//! │ delete       │ any        │ not on a pallet                          │
//! │ palletize    │ completed, │ not on a pallet, same order, pallet open │
//! │              │ sealed     │                                          │
//! └──────────────┴────────────┴──────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{
    Component, Package, PackageStatus, PackingMethod, Pallet, PalletStatus,
};

fn transition(entity: &'static str, number: &str, from: impl ToString, action: &'static str) -> CoreError {
    CoreError::InvalidTransition {
        entity,
        number: number.to_string(),
        from: from.to_string(),
        action,
    }
}

fn pallet_assigned(package: &Package, pallet_number: Option<&str>) -> CoreResult<()> {
    if package.pallet_id.is_some() {
        return Err(CoreError::PalletAssigned {
            package_number: package.package_number.clone(),
            pallet_number: pallet_number.unwrap_or("?").to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Component Membership
// =============================================================================

/// Components can only enter or leave open packages that are not on a pallet.
pub fn ensure_package_editable(package: &Package) -> CoreResult<()> {
    if package.status != PackageStatus::Open || package.pallet_id.is_some() {
        return Err(CoreError::PackageSealed {
            package_number: package.package_number.clone(),
            status: package.status,
        });
    }
    Ok(())
}

/// A component may only join a package of its own order.
pub fn ensure_same_order(package: &Package, component: &Component) -> CoreResult<()> {
    if package.order_id != component.order_id {
        return Err(CoreError::OrderMismatch {
            entity: "Component",
            number: component.code.clone(),
            expected: package.order_id.clone(),
            found: component.order_id.clone(),
        });
    }
    Ok(())
}

/// Checks the packing-method constraint against one existing member.
///
/// All members already agree with each other, so comparing the candidate to
/// any single member (`anchor`) is sufficient. An empty package accepts
/// anything.
pub fn ensure_method_compatible(
    package: &Package,
    anchor: Option<&Component>,
    candidate: &Component,
) -> CoreResult<()> {
    let Some(anchor) = anchor else {
        return Ok(());
    };

    let mismatch = |field: &str, expected: &Option<String>, found: &Option<String>| {
        CoreError::MethodMismatch {
            package_number: package.package_number.clone(),
            method: package.packing_method,
            field: field.to_string(),
            expected: expected.clone().unwrap_or_default(),
            found: found.clone().unwrap_or_default(),
        }
    };

    match package.packing_method {
        PackingMethod::Mixed => Ok(()),
        PackingMethod::ByRoom => {
            if anchor.room != candidate.room {
                return Err(mismatch("room", &anchor.room, &candidate.room));
            }
            Ok(())
        }
        PackingMethod::ByCabinet => {
            if anchor.room != candidate.room {
                return Err(mismatch("room", &anchor.room, &candidate.room));
            }
            if anchor.cabinet != candidate.cabinet {
                return Err(mismatch("cabinet", &anchor.cabinet, &candidate.cabinet));
            }
            Ok(())
        }
    }
}

// =============================================================================
// Package Transitions
// =============================================================================

pub fn ensure_can_complete(package: &Package) -> CoreResult<()> {
    if package.status != PackageStatus::Open {
        return Err(transition("package", &package.package_number, package.status, "complete"));
    }
    if package.component_count <= 0 {
        return Err(CoreError::EmptyPackage {
            package_number: package.package_number.clone(),
        });
    }
    Ok(())
}

pub fn ensure_can_reopen(package: &Package, pallet_number: Option<&str>) -> CoreResult<()> {
    pallet_assigned(package, pallet_number)?;
    if package.status != PackageStatus::Completed {
        return Err(transition("package", &package.package_number, package.status, "reopen"));
    }
    Ok(())
}

pub fn ensure_can_seal(package: &Package) -> CoreResult<()> {
    if package.status != PackageStatus::Completed {
        return Err(transition("package", &package.package_number, package.status, "seal"));
    }
    Ok(())
}

pub fn ensure_can_unseal(package: &Package, pallet_number: Option<&str>) -> CoreResult<()> {
    pallet_assigned(package, pallet_number)?;
    if package.status != PackageStatus::Sealed {
        return Err(transition("package", &package.package_number, package.status, "unseal"));
    }
    Ok(())
}

pub fn ensure_can_delete_package(package: &Package, pallet_number: Option<&str>) -> CoreResult<()> {
    pallet_assigned(package, pallet_number)
}

// =============================================================================
// Pallet Transitions
// =============================================================================

pub fn ensure_pallet_open(pallet: &Pallet) -> CoreResult<()> {
    if pallet.status != PalletStatus::Open {
        return Err(CoreError::PalletNotOpen {
            pallet_number: pallet.pallet_number.clone(),
            status: pallet.status,
        });
    }
    Ok(())
}

/// Checks that `package` may be put on `pallet`.
///
/// `current_pallet_number` is the number of the pallet the package already
/// sits on, if any (used only for the error message).
pub fn ensure_can_palletize(
    package: &Package,
    pallet: &Pallet,
    current_pallet_number: Option<&str>,
) -> CoreResult<()> {
    if !package.status.is_palletizable() {
        return Err(CoreError::PackageNotSealable {
            package_number: package.package_number.clone(),
            status: package.status,
        });
    }
    pallet_assigned(package, current_pallet_number)?;
    if package.order_id != pallet.order_id {
        return Err(CoreError::OrderMismatch {
            entity: "Package",
            number: package.package_number.clone(),
            expected: pallet.order_id.clone(),
            found: package.order_id.clone(),
        });
    }
    ensure_pallet_open(pallet)
}

/// Membership of a closed pallet is frozen. Sealed pallets are unsealed
/// implicitly by the caller.
pub fn ensure_can_remove_from(pallet: &Pallet) -> CoreResult<()> {
    if pallet.status == PalletStatus::Closed {
        return Err(CoreError::PalletNotOpen {
            pallet_number: pallet.pallet_number.clone(),
            status: pallet.status,
        });
    }
    Ok(())
}

pub fn ensure_can_unseal_pallet(pallet: &Pallet) -> CoreResult<()> {
    if pallet.status != PalletStatus::Sealed {
        return Err(transition("pallet", &pallet.pallet_number, pallet.status, "unseal"));
    }
    Ok(())
}

pub fn ensure_can_close_pallet(pallet: &Pallet) -> CoreResult<()> {
    if pallet.status != PalletStatus::Sealed {
        return Err(transition("pallet", &pallet.pallet_number, pallet.status, "close"));
    }
    Ok(())
}

pub fn ensure_can_delete_pallet(pallet: &Pallet) -> CoreResult<()> {
    if pallet.status == PalletStatus::Closed {
        return Err(transition("pallet", &pallet.pallet_number, pallet.status, "delete"));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentStatus;
    use chrono::Utc;

    fn package(method: PackingMethod, status: PackageStatus, count: i64) -> Package {
        let now = Utc::now();
        Package {
            id: "p1".into(),
            order_id: "o1".into(),
            package_number: "20261016-0001".into(),
            sequence_index: 1,
            pallet_id: None,
            packing_method: method,
            status,
            is_manual: false,
            component_count: count,
            created_at: now,
            updated_at: now,
            completed_at: None,
            sealed_at: None,
        }
    }

    fn pallet(status: PalletStatus) -> Pallet {
        let now = Utc::now();
        Pallet {
            id: "t1".into(),
            order_id: "o1".into(),
            pallet_number: "T20261016-001".into(),
            sequence_index: 1,
            is_virtual: false,
            status,
            sealed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn component(room: &str, cabinet: &str) -> Component {
        Component {
            id: format!("c-{room}-{cabinet}"),
            order_id: "o1".into(),
            code: format!("{room}{cabinet}"),
            name: "Panel".into(),
            material: None,
            length_mm: 600.0,
            width_mm: 300.0,
            thickness_mm: 18.0,
            room: Some(room.into()),
            cabinet: Some(cabinet.into()),
            package_id: None,
            status: ComponentStatus::Pending,
            scanned_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_by_room_rejects_other_room() {
        let pkg = package(PackingMethod::ByRoom, PackageStatus::Open, 1);
        let anchor = component("R1", "A");
        let err = ensure_method_compatible(&pkg, Some(&anchor), &component("R2", "A")).unwrap_err();
        match err {
            CoreError::MethodMismatch { field, expected, found, .. } => {
                assert_eq!(field, "room");
                assert_eq!(expected, "R1");
                assert_eq!(found, "R2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ensure_method_compatible(&pkg, Some(&anchor), &component("R1", "B")).is_ok());
    }

    #[test]
    fn test_by_cabinet_checks_both_labels() {
        let pkg = package(PackingMethod::ByCabinet, PackageStatus::Open, 1);
        let anchor = component("R1", "A");
        assert!(ensure_method_compatible(&pkg, Some(&anchor), &component("R1", "A")).is_ok());
        assert!(matches!(
            ensure_method_compatible(&pkg, Some(&anchor), &component("R1", "B")),
            Err(CoreError::MethodMismatch { ref field, .. }) if field == "cabinet"
        ));
    }

    #[test]
    fn test_empty_package_accepts_anything() {
        let pkg = package(PackingMethod::ByCabinet, PackageStatus::Open, 0);
        assert!(ensure_method_compatible(&pkg, None, &component("R9", "Z")).is_ok());
    }

    #[test]
    fn test_mixed_ignores_labels() {
        let pkg = package(PackingMethod::Mixed, PackageStatus::Open, 1);
        let anchor = component("R1", "A");
        assert!(ensure_method_compatible(&pkg, Some(&anchor), &component("R2", "B")).is_ok());
    }

    #[test]
    fn test_complete_requires_components() {
        let pkg = package(PackingMethod::Mixed, PackageStatus::Open, 0);
        assert!(matches!(ensure_can_complete(&pkg), Err(CoreError::EmptyPackage { .. })));

        let pkg = package(PackingMethod::Mixed, PackageStatus::Sealed, 3);
        assert!(matches!(
            ensure_can_complete(&pkg),
            Err(CoreError::InvalidTransition { action: "complete", .. })
        ));
    }

    #[test]
    fn test_reopen_blocked_by_pallet() {
        let mut pkg = package(PackingMethod::Mixed, PackageStatus::Completed, 2);
        assert!(ensure_can_reopen(&pkg, None).is_ok());

        pkg.pallet_id = Some("t1".into());
        assert!(matches!(
            ensure_can_reopen(&pkg, Some("T20261016-001")),
            Err(CoreError::PalletAssigned { ref pallet_number, .. }) if pallet_number == "T20261016-001"
        ));
    }

    #[test]
    fn test_unseal_requires_sealed() {
        let pkg = package(PackingMethod::Mixed, PackageStatus::Completed, 2);
        assert!(ensure_can_unseal(&pkg, None).is_err());
        let pkg = package(PackingMethod::Mixed, PackageStatus::Sealed, 2);
        assert!(ensure_can_unseal(&pkg, None).is_ok());
    }

    #[test]
    fn test_palletize_rules() {
        let open = package(PackingMethod::Mixed, PackageStatus::Open, 2);
        assert!(matches!(
            ensure_can_palletize(&open, &pallet(PalletStatus::Open), None),
            Err(CoreError::PackageNotSealable { .. })
        ));

        let completed = package(PackingMethod::Mixed, PackageStatus::Completed, 2);
        assert!(ensure_can_palletize(&completed, &pallet(PalletStatus::Open), None).is_ok());
        assert!(matches!(
            ensure_can_palletize(&completed, &pallet(PalletStatus::Sealed), None),
            Err(CoreError::PalletNotOpen { .. })
        ));

        let mut other_order = pallet(PalletStatus::Open);
        other_order.order_id = "o2".into();
        assert!(matches!(
            ensure_can_palletize(&completed, &other_order, None),
            Err(CoreError::OrderMismatch { .. })
        ));
    }

    #[test]
    fn test_editable_only_when_open() {
        assert!(ensure_package_editable(&package(PackingMethod::Mixed, PackageStatus::Open, 0)).is_ok());
        assert!(matches!(
            ensure_package_editable(&package(PackingMethod::Mixed, PackageStatus::Completed, 1)),
            Err(CoreError::PackageSealed { status: PackageStatus::Completed, .. })
        ));
    }

    #[test]
    fn test_pallet_transitions() {
        assert!(ensure_can_unseal_pallet(&pallet(PalletStatus::Sealed)).is_ok());
        assert!(ensure_can_unseal_pallet(&pallet(PalletStatus::Open)).is_err());
        assert!(ensure_can_close_pallet(&pallet(PalletStatus::Sealed)).is_ok());
        assert!(ensure_can_delete_pallet(&pallet(PalletStatus::Sealed)).is_ok());
        assert!(ensure_can_delete_pallet(&pallet(PalletStatus::Closed)).is_err());
        assert!(ensure_can_remove_from(&pallet(PalletStatus::Closed)).is_err());
    }
}
