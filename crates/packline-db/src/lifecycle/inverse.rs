//! # Inverse Operations
//!
//! One inverse per logged operation type, applied by the undo manager inside
//! its own transaction.
//!
//! Each inverse re-checks that its target is still in the state the forward
//! operation left it in. Anything else (row gone, status moved on, slot
//! re-used) is an [`CoreError::UndoConflict`]; the caller rolls back.
//!
//! | op_type                      | inverse                                   |
//! |------------------------------|-------------------------------------------|
//! | scan_component               | component back to pending, recount        |
//! | detach_component             | re-attach to the (still open) package     |
//! | create_package               | cascade-delete the package                |
//! | complete_package             | open, clear completed_at                  |
//! | reopen_package               | completed again                           |
//! | seal_package                 | completed, clear sealed_at                |
//! | unseal_package               | sealed again                              |
//! | delete_package               | recreate, re-attach members still pending |
//! | create_pallet                | cascade-delete the pallet                 |
//! | add_package_to_pallet        | off the pallet, previous status           |
//! | remove_package_from_pallet   | back on the pallet, sealed                |
//! | seal_pallet / unseal_pallet  | open / sealed                             |
//! | close_pallet                 | sealed                                    |
//! | delete_pallet                | recreate pallet, members and cargo        |
//! | add_cargo / remove_cargo     | delete / reinsert the item                |

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::{cascade_package_delete, cascade_pallet_delete};
use crate::error::{EngineError, EngineResult};
use crate::repository::{cargo, component, package as package_repo, pallet as pallet_repo};
use packline_core::{
    CoreError, LifecycleEvent, Operation, Package, PackageStatus, Pallet, PalletMember,
    PalletStatus, VirtualItem,
};

fn conflict(op: &Operation, reason: impl Into<String>) -> EngineError {
    CoreError::undo_conflict(op.op_type(), reason).into()
}

async fn package_for(conn: &mut SqliteConnection, op: &Operation, id: &str) -> EngineResult<Package> {
    package_repo::fetch(conn, id)
        .await?
        .ok_or_else(|| conflict(op, format!("package {id} no longer exists")))
}

async fn pallet_for(conn: &mut SqliteConnection, op: &Operation, id: &str) -> EngineResult<Pallet> {
    pallet_repo::fetch(conn, id)
        .await?
        .ok_or_else(|| conflict(op, format!("pallet {id} no longer exists")))
}

/// Open and not on a pallet: the only state in which membership may change.
fn ensure_open_unassigned(op: &Operation, package: &Package) -> EngineResult<()> {
    if package.status != PackageStatus::Open || package.is_on_pallet() {
        return Err(conflict(
            op,
            format!("package {} is {} and cannot change members", package.package_number, package.status),
        ));
    }
    Ok(())
}

fn ensure_status(op: &Operation, package: &Package, expected: PackageStatus) -> EngineResult<()> {
    if package.status != expected || package.is_on_pallet() {
        return Err(conflict(
            op,
            format!(
                "package {} is {} (expected {} and off any pallet)",
                package.package_number, package.status, expected
            ),
        ));
    }
    Ok(())
}

fn ensure_pallet_status(op: &Operation, pallet: &Pallet, expected: PalletStatus) -> EngineResult<()> {
    if pallet.status != expected {
        return Err(conflict(
            op,
            format!("pallet {} is {} (expected {})", pallet.pallet_number, pallet.status, expected),
        ));
    }
    Ok(())
}

/// Applies the inverse of `op` and returns the events it produced.
pub(crate) async fn revert(conn: &mut SqliteConnection, op: &Operation) -> EngineResult<Vec<LifecycleEvent>> {
    debug!(op_type = op.op_type(), "Applying inverse");

    match op {
        Operation::ScanComponent {
            component_id,
            package_id,
        }
        | Operation::AttachComponent {
            component_id,
            package_id,
        } => revert_attach(conn, op, component_id, package_id).await,

        Operation::DetachComponent {
            component_id,
            package_id,
        } => {
            let comp = component::fetch(conn, component_id)
                .await?
                .ok_or_else(|| conflict(op, format!("component {component_id} no longer exists")))?;
            if comp.is_packed() {
                return Err(conflict(op, format!("component {} was packed again", comp.code)));
            }
            let package = package_for(conn, op, package_id).await?;
            ensure_open_unassigned(op, &package)?;

            component::set_packed(conn, &comp.id, &package.id, None).await?;
            package_repo::recount(conn, &package.id).await?;
            Ok(Vec::new())
        }

        Operation::CreatePackage { package_id } => {
            let package = package_for(conn, op, package_id).await?;
            if package.is_on_pallet() {
                return Err(conflict(
                    op,
                    format!("package {} is on a pallet", package.package_number),
                ));
            }
            let released = cascade_package_delete(conn, &package).await?;
            Ok(detached(package.order_id, released))
        }

        Operation::CompletePackage { package_id } => {
            let mut package = package_for(conn, op, package_id).await?;
            ensure_status(op, &package, PackageStatus::Completed)?;
            package.status = PackageStatus::Open;
            package.completed_at = None;
            package_repo::update(conn, &package).await?;
            Ok(Vec::new())
        }

        Operation::ReopenPackage { package_id } => {
            let mut package = package_for(conn, op, package_id).await?;
            ensure_status(op, &package, PackageStatus::Open)?;
            if package.component_count == 0 {
                return Err(conflict(op, format!("package {} is now empty", package.package_number)));
            }
            package.status = PackageStatus::Completed;
            package.completed_at = Some(Utc::now());
            package_repo::update(conn, &package).await?;
            Ok(Vec::new())
        }

        Operation::SealPackage { package_id } => {
            let mut package = package_for(conn, op, package_id).await?;
            ensure_status(op, &package, PackageStatus::Sealed)?;
            package.status = PackageStatus::Completed;
            package.sealed_at = None;
            package_repo::update(conn, &package).await?;
            Ok(Vec::new())
        }

        Operation::UnsealPackage { package_id } => {
            let mut package = package_for(conn, op, package_id).await?;
            ensure_status(op, &package, PackageStatus::Open)?;
            if package.component_count == 0 {
                return Err(conflict(op, format!("package {} is now empty", package.package_number)));
            }
            let now = Utc::now();
            package.status = PackageStatus::Sealed;
            package.completed_at = Some(now);
            package.sealed_at = Some(now);
            package_repo::update(conn, &package).await?;
            Ok(Vec::new())
        }

        Operation::DeletePackage {
            package,
            component_ids,
        } => restore_package(conn, op, package, component_ids).await,

        Operation::CreatePallet { pallet_id } => {
            let pallet = pallet_for(conn, op, pallet_id).await?;
            if pallet.status == PalletStatus::Closed {
                return Err(conflict(op, format!("pallet {} is closed", pallet.pallet_number)));
            }
            cascade_pallet_delete(conn, &pallet).await?;
            Ok(Vec::new())
        }

        Operation::AddPackageToPallet {
            pallet_id,
            package_id,
            previous_status,
        } => {
            let mut package = package_for(conn, op, package_id).await?;
            if package.pallet_id.as_deref() != Some(pallet_id.as_str()) {
                return Err(conflict(
                    op,
                    format!("package {} is no longer on that pallet", package.package_number),
                ));
            }
            let pallet = pallet_for(conn, op, pallet_id).await?;
            ensure_pallet_status(op, &pallet, PalletStatus::Open)?;

            package.pallet_id = None;
            package.status = *previous_status;
            if *previous_status == PackageStatus::Completed {
                package.sealed_at = None;
            }
            package_repo::update(conn, &package).await?;
            pallet_repo::unlink(conn, &pallet.id, &package.id).await?;
            Ok(Vec::new())
        }

        Operation::RemovePackageFromPallet {
            pallet_id,
            package_id,
            previous_status,
        } => {
            let mut package = package_for(conn, op, package_id).await?;
            ensure_status(op, &package, PackageStatus::Completed)?;
            let pallet = pallet_for(conn, op, pallet_id).await?;
            ensure_pallet_status(op, &pallet, PalletStatus::Open)?;

            package.pallet_id = Some(pallet.id.clone());
            package.status = *previous_status;
            package.sealed_at = Some(Utc::now());
            package_repo::update(conn, &package).await?;
            pallet_repo::link(conn, &pallet.id, &package.id).await?;
            Ok(Vec::new())
        }

        Operation::SealPallet { pallet_id } => {
            let mut pallet = pallet_for(conn, op, pallet_id).await?;
            ensure_pallet_status(op, &pallet, PalletStatus::Sealed)?;
            pallet.status = PalletStatus::Open;
            pallet.sealed_at = None;
            pallet_repo::update(conn, &pallet).await?;
            Ok(Vec::new())
        }

        Operation::UnsealPallet { pallet_id } => {
            let mut pallet = pallet_for(conn, op, pallet_id).await?;
            ensure_pallet_status(op, &pallet, PalletStatus::Open)?;
            pallet.status = PalletStatus::Sealed;
            pallet.sealed_at = Some(Utc::now());
            pallet_repo::update(conn, &pallet).await?;
            Ok(Vec::new())
        }

        Operation::ClosePallet { pallet_id } => {
            let mut pallet = pallet_for(conn, op, pallet_id).await?;
            ensure_pallet_status(op, &pallet, PalletStatus::Closed)?;
            pallet.status = PalletStatus::Sealed;
            pallet_repo::update(conn, &pallet).await?;
            Ok(Vec::new())
        }

        Operation::DeletePallet {
            pallet,
            members,
            cargo: items,
        } => restore_pallet(conn, op, pallet, members, items).await,

        Operation::AddCargo { item } => {
            let pallet = pallet_for(conn, op, &item.pallet_id).await?;
            ensure_pallet_status(op, &pallet, PalletStatus::Open)?;
            if cargo::fetch(conn, &item.id).await?.is_none() {
                return Err(conflict(op, format!("cargo item {} was already removed", item.name)));
            }
            cargo::delete(conn, &item.id).await?;
            Ok(Vec::new())
        }

        Operation::RemoveCargo { item } => {
            let pallet = pallet_for(conn, op, &item.pallet_id).await?;
            ensure_pallet_status(op, &pallet, PalletStatus::Open)?;
            if cargo::fetch(conn, &item.id).await?.is_some() {
                return Err(conflict(op, format!("cargo item {} already exists", item.name)));
            }
            cargo::insert(conn, item).await?;
            Ok(Vec::new())
        }

        Operation::Undo { .. } => Err(conflict(op, "undo entries are not reversible")),
    }
}

fn detached(order_id: String, component_ids: Vec<String>) -> Vec<LifecycleEvent> {
    if component_ids.is_empty() {
        return Vec::new();
    }
    vec![LifecycleEvent::ComponentsDetached {
        order_id,
        component_ids,
    }]
}

async fn revert_attach(
    conn: &mut SqliteConnection,
    op: &Operation,
    component_id: &str,
    package_id: &str,
) -> EngineResult<Vec<LifecycleEvent>> {
    let comp = component::fetch(conn, component_id)
        .await?
        .ok_or_else(|| conflict(op, format!("component {component_id} no longer exists")))?;
    if comp.package_id.as_deref() != Some(package_id) {
        return Err(conflict(op, format!("component {} moved out of the package", comp.code)));
    }
    let package = package_for(conn, op, package_id).await?;
    ensure_open_unassigned(op, &package)?;

    component::set_pending(conn, &comp.id).await?;
    package_repo::recount(conn, &package.id).await?;
    Ok(detached(comp.order_id, vec![comp.id]))
}

/// Reinserts a deleted package under its old id, number and index, then
/// pulls back the members nobody else has packed in the meantime.
async fn restore_package(
    conn: &mut SqliteConnection,
    op: &Operation,
    snapshot: &Package,
    component_ids: &[String],
) -> EngineResult<Vec<LifecycleEvent>> {
    if package_repo::fetch(conn, &snapshot.id).await?.is_some() {
        return Err(conflict(op, format!("package {} already exists", snapshot.package_number)));
    }
    if package_repo::number_taken(conn, &snapshot.package_number).await? {
        return Err(conflict(
            op,
            format!("number {} was reused", snapshot.package_number),
        ));
    }
    if package_repo::index_taken(conn, &snapshot.order_id, snapshot.sequence_index).await? {
        return Err(conflict(
            op,
            format!("package index {} was reused", snapshot.sequence_index),
        ));
    }

    let mut restored = snapshot.clone();
    restored.pallet_id = None;
    restored.component_count = 0;
    package_repo::insert(conn, &restored).await?;

    let mut reattached = 0usize;
    for id in component_ids {
        let Some(comp) = component::fetch(conn, id).await? else {
            continue;
        };
        if comp.is_packed() || comp.order_id != restored.order_id {
            continue;
        }
        component::set_packed(conn, &comp.id, &restored.id, None).await?;
        reattached += 1;
    }
    let count = package_repo::recount(conn, &restored.id).await?;

    if restored.status != PackageStatus::Open && count == 0 {
        return Err(conflict(
            op,
            format!(
                "package {} was {} but none of its components are free",
                restored.package_number, restored.status
            ),
        ));
    }

    debug!(package = %restored.package_number, reattached, "Package restored");
    Ok(Vec::new())
}

/// Reinserts a deleted pallet with its memberships and cargo. Fails as a
/// whole if any member or item cannot be put back.
async fn restore_pallet(
    conn: &mut SqliteConnection,
    op: &Operation,
    snapshot: &Pallet,
    members: &[PalletMember],
    items: &[VirtualItem],
) -> EngineResult<Vec<LifecycleEvent>> {
    if pallet_repo::fetch(conn, &snapshot.id).await?.is_some() {
        return Err(conflict(op, format!("pallet {} already exists", snapshot.pallet_number)));
    }
    if pallet_repo::number_taken(conn, &snapshot.pallet_number).await? {
        return Err(conflict(op, format!("number {} was reused", snapshot.pallet_number)));
    }
    if pallet_repo::index_taken(conn, &snapshot.order_id, snapshot.sequence_index).await? {
        return Err(conflict(
            op,
            format!("pallet index {} was reused", snapshot.sequence_index),
        ));
    }
    pallet_repo::insert(conn, snapshot).await?;

    for member in members {
        let mut package = package_for(conn, op, &member.package_id).await?;
        let movable = matches!(package.status, PackageStatus::Completed | PackageStatus::Sealed);
        if package.is_on_pallet() || !movable {
            return Err(conflict(
                op,
                format!(
                    "package {} is {} and cannot go back on the pallet",
                    package.package_number, package.status
                ),
            ));
        }
        package.pallet_id = Some(snapshot.id.clone());
        package.status = member.status;
        if member.status == PackageStatus::Sealed && package.sealed_at.is_none() {
            package.sealed_at = Some(Utc::now());
        }
        package_repo::update(conn, &package).await?;
        pallet_repo::link(conn, &snapshot.id, &package.id).await?;
    }

    for item in items {
        if cargo::fetch(conn, &item.id).await?.is_some() {
            return Err(conflict(op, format!("cargo item {} already exists", item.name)));
        }
        cargo::insert(conn, item).await?;
    }

    debug!(pallet = %snapshot.pallet_number, members = members.len(), cargo = items.len(), "Pallet restored");
    Ok(Vec::new())
}
