//! Package operations.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::{
    cascade_package_delete, ensure_order, load_component, load_package, pallet_number_of,
    Journal, LifecycleEngine,
};
use crate::error::EngineResult;
use crate::identity;
use crate::repository::{component, package as package_repo, settings};
use crate::undo::UndoManager;
use packline_core::{
    rules, Component, ComponentStatus, CoreError, LifecycleEvent, Operation, Package, PackageStatus,
    PackingMethod,
};

// =============================================================================
// Transaction-Level Steps
// =============================================================================
// Shared with the scan pipeline, which runs them inside its own transaction.

/// Attaches `component` to `package` after checking, in order: already
/// packed, package editable, same order, packing method.
///
/// Returns the package with its refreshed count and the updated component.
pub(crate) async fn attach_in(
    conn: &mut SqliteConnection,
    mut package: Package,
    mut component: Component,
    scanned_at: Option<DateTime<Utc>>,
) -> EngineResult<(Package, Component)> {
    if let Some(owner_id) = &component.package_id {
        let package_number = package_repo::fetch(conn, owner_id)
            .await?
            .map(|p| p.package_number)
            .unwrap_or_else(|| owner_id.clone());
        return Err(CoreError::AlreadyPacked {
            code: component.code.clone(),
            package_number,
        }
        .into());
    }

    rules::ensure_package_editable(&package)?;
    rules::ensure_same_order(&package, &component)?;
    let anchor = component::any_member(conn, &package.id).await?;
    rules::ensure_method_compatible(&package, anchor.as_ref(), &component)?;

    component::set_packed(conn, &component.id, &package.id, scanned_at).await?;
    package.component_count = package_repo::recount(conn, &package.id).await?;

    component.package_id = Some(package.id.clone());
    component.status = ComponentStatus::Packed;
    component.scanned_at = scanned_at;
    Ok((package, component))
}

/// Moves an open, non-empty package to `completed`.
pub(crate) async fn complete_in(conn: &mut SqliteConnection, package_id: &str) -> EngineResult<Package> {
    let mut package = load_package(conn, package_id).await?;
    rules::ensure_can_complete(&package)?;

    package.status = PackageStatus::Completed;
    package.completed_at = Some(Utc::now());
    package_repo::update(conn, &package).await?;
    Ok(package)
}

// =============================================================================
// Engine Operations
// =============================================================================

impl LifecycleEngine {
    /// Creates an empty open package with a fresh number and the order's
    /// smallest free sequence index.
    pub async fn create_package(
        &self,
        undo: &mut UndoManager,
        order_id: &str,
        method: PackingMethod,
        is_manual: bool,
    ) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        ensure_order(&mut tx, order_id).await?;

        let format = settings::number_format(&mut tx).await?;
        let package_number = identity::new_package_number(&mut tx, &format, identity::today()).await?;
        let sequence_index = identity::next_package_index(&mut tx, order_id).await?;

        let now = Utc::now();
        let package = Package {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            package_number,
            sequence_index,
            pallet_id: None,
            packing_method: method,
            status: PackageStatus::Open,
            is_manual,
            component_count: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            sealed_at: None,
        };
        package_repo::insert(&mut tx, &package).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::CreatePackage {
                package_id: package.id.clone(),
            },
            format!("Created package {} ({})", package.package_number, method),
        );
        self.commit(tx, undo, journal).await?;

        info!(
            package_id = %package.id,
            number = %package.package_number,
            index = package.sequence_index,
            "Package created"
        );
        Ok(package)
    }

    /// Puts a component into a package without going through the scanner.
    ///
    /// Logged for audit; reverted together with the package's creation
    /// rather than individually.
    pub async fn attach_component(
        &self,
        undo: &mut UndoManager,
        package_id: &str,
        component_id: &str,
    ) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        let package = load_package(&mut tx, package_id).await?;
        let component = load_component(&mut tx, component_id).await?;

        let (package, component) = attach_in(&mut tx, package, component, None).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::AttachComponent {
                component_id: component.id.clone(),
                package_id: package.id.clone(),
            },
            format!("Attached {} to package {}", component.code, package.package_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(code = %component.code, package = %package.package_number, "Component attached");
        Ok(package)
    }

    /// Takes a component out of its (open, unassigned) package.
    pub async fn detach_component(
        &self,
        undo: &mut UndoManager,
        component_id: &str,
    ) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        let component = load_component(&mut tx, component_id).await?;
        let Some(package_id) = component.package_id.clone() else {
            return Err(CoreError::NotPacked {
                code: component.code,
            }
            .into());
        };

        let mut package = load_package(&mut tx, &package_id).await?;
        rules::ensure_package_editable(&package)?;

        component::set_pending(&mut tx, &component.id).await?;
        package.component_count = package_repo::recount(&mut tx, &package.id).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::DetachComponent {
                component_id: component.id.clone(),
                package_id: package.id.clone(),
            },
            format!("Detached {} from package {}", component.code, package.package_number),
        );
        journal.emit(LifecycleEvent::ComponentsDetached {
            order_id: component.order_id.clone(),
            component_ids: vec![component.id.clone()],
        });
        self.commit(tx, undo, journal).await?;

        info!(code = %component.code, package = %package.package_number, "Component detached");
        Ok(package)
    }

    pub async fn complete_package(&self, undo: &mut UndoManager, package_id: &str) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        let package = complete_in(&mut tx, package_id).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::CompletePackage {
                package_id: package.id.clone(),
            },
            format!("Completed package {}", package.package_number),
        );
        journal.emit(LifecycleEvent::PackageCompleted {
            order_id: package.order_id.clone(),
            package_id: package.id.clone(),
        });
        self.commit(tx, undo, journal).await?;

        info!(package = %package.package_number, count = package.component_count, "Package completed");
        Ok(package)
    }

    pub async fn reopen_package(&self, undo: &mut UndoManager, package_id: &str) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        let mut package = load_package(&mut tx, package_id).await?;
        let pallet_number = pallet_number_of(&mut tx, &package).await?;
        rules::ensure_can_reopen(&package, pallet_number.as_deref())?;

        package.status = PackageStatus::Open;
        package.completed_at = None;
        package_repo::update(&mut tx, &package).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::ReopenPackage {
                package_id: package.id.clone(),
            },
            format!("Reopened package {}", package.package_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(package = %package.package_number, "Package reopened");
        Ok(package)
    }

    pub async fn seal_package(&self, undo: &mut UndoManager, package_id: &str) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        let mut package = load_package(&mut tx, package_id).await?;
        rules::ensure_can_seal(&package)?;

        package.status = PackageStatus::Sealed;
        package.sealed_at = Some(Utc::now());
        package_repo::update(&mut tx, &package).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::SealPackage {
                package_id: package.id.clone(),
            },
            format!("Sealed package {}", package.package_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(package = %package.package_number, "Package sealed");
        Ok(package)
    }

    /// Sealed packages reopen directly; there is no intermediate
    /// `completed` step.
    pub async fn unseal_package(&self, undo: &mut UndoManager, package_id: &str) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        let mut package = load_package(&mut tx, package_id).await?;
        let pallet_number = pallet_number_of(&mut tx, &package).await?;
        rules::ensure_can_unseal(&package, pallet_number.as_deref())?;

        package.status = PackageStatus::Open;
        package.sealed_at = None;
        package.completed_at = None;
        package_repo::update(&mut tx, &package).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::UnsealPackage {
                package_id: package.id.clone(),
            },
            format!("Unsealed package {}", package.package_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(package = %package.package_number, "Package unsealed");
        Ok(package)
    }

    /// Deletes an unassigned package, returning its members to pending.
    pub async fn delete_package(&self, undo: &mut UndoManager, package_id: &str) -> EngineResult<()> {
        let mut tx = self.begin().await?;
        let package = load_package(&mut tx, package_id).await?;
        let pallet_number = pallet_number_of(&mut tx, &package).await?;
        rules::ensure_can_delete_package(&package, pallet_number.as_deref())?;

        let released = cascade_package_delete(&mut tx, &package).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::DeletePackage {
                package: package.clone(),
                component_ids: released.clone(),
            },
            format!(
                "Deleted package {} ({} components released)",
                package.package_number,
                released.len()
            ),
        );
        if !released.is_empty() {
            journal.emit(LifecycleEvent::ComponentsDetached {
                order_id: package.order_id.clone(),
                component_ids: released,
            });
        }
        self.commit(tx, undo, journal).await?;

        info!(package = %package.package_number, "Package deleted");
        Ok(())
    }
}
