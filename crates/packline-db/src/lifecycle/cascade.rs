//! Cascading deletes.
//!
//! The schema carries no `ON DELETE` actions; children are released here,
//! inside the caller's transaction, before the parent row goes.
//!
//! ```text
//! delete package ─► members: pending, package_id NULL
//!                ─► pallet_packages rows for the package
//!                ─► packages row
//!
//! delete pallet  ─► members: pallet_id NULL, sealed → completed
//!                ─► pallet_packages rows for the pallet
//!                ─► virtual_items on the pallet
//!                ─► pallets row
//! ```

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::{cargo, component, package as package_repo, pallet as pallet_repo};
use packline_core::{Package, PackageStatus, Pallet, PalletMember, VirtualItem};

/// What a pallet held at the moment it was deleted.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PalletContents {
    pub members: Vec<PalletMember>,
    pub cargo: Vec<VirtualItem>,
}

/// Deletes a package and returns the ids of the components it released.
pub(crate) async fn cascade_package_delete(
    conn: &mut SqliteConnection,
    package: &Package,
) -> DbResult<Vec<String>> {
    let released = component::release_all(conn, &package.id).await?;
    pallet_repo::unlink_package(conn, &package.id).await?;
    package_repo::delete(conn, &package.id).await?;

    debug!(package = %package.package_number, released = released.len(), "Package cascade applied");
    Ok(released)
}

/// Deletes a pallet, returning its members and cargo as they were.
pub(crate) async fn cascade_pallet_delete(
    conn: &mut SqliteConnection,
    pallet: &Pallet,
) -> DbResult<PalletContents> {
    let packages = package_repo::fetch_by_pallet(conn, &pallet.id).await?;
    let mut members = Vec::with_capacity(packages.len());

    for mut package in packages {
        members.push(PalletMember {
            package_id: package.id.clone(),
            status: package.status,
        });
        package.pallet_id = None;
        if package.status == PackageStatus::Sealed {
            package.status = PackageStatus::Completed;
            package.sealed_at = None;
        }
        package_repo::update(conn, &package).await?;
    }
    pallet_repo::unlink_pallet(conn, &pallet.id).await?;

    let cargo_items = cargo::fetch_by_pallet(conn, &pallet.id).await?;
    cargo::delete_by_pallet(conn, &pallet.id).await?;
    pallet_repo::delete(conn, &pallet.id).await?;

    debug!(
        pallet = %pallet.pallet_number,
        members = members.len(),
        cargo = cargo_items.len(),
        "Pallet cascade applied"
    );
    Ok(PalletContents {
        members,
        cargo: cargo_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use packline_core::{PackingMethod, DEFAULT_UNDO_CAPACITY};

    #[tokio::test]
    async fn test_pallet_cascade_releases_members_and_drops_cargo() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let engine = db.engine();
        let mut undo = engine.undo_manager(DEFAULT_UNDO_CAPACITY);
        let order = db.orders().create("O-1").await.unwrap();

        let pkg = engine
            .create_package(&mut undo, &order.id, PackingMethod::Mixed, true)
            .await
            .unwrap();
        let comp = crate::test_support::component(&db, &order.id, "C-1", None, None).await;
        engine.attach_component(&mut undo, &pkg.id, &comp.id).await.unwrap();
        engine.complete_package(&mut undo, &pkg.id).await.unwrap();

        let pallet = engine.create_pallet(&mut undo, &order.id, false).await.unwrap();
        engine.add_package_to_pallet(&mut undo, &pallet.id, &pkg.id).await.unwrap();
        engine
            .add_cargo(&mut undo, &pallet.id, "Hinges", 4.0, "box")
            .await
            .unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let contents = cascade_pallet_delete(&mut tx, &pallet).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(contents.members.len(), 1);
        assert_eq!(contents.members[0].status, PackageStatus::Sealed);
        assert_eq!(contents.cargo.len(), 1);

        let after = db.packages().get(&pkg.id).await.unwrap().unwrap();
        assert_eq!(after.pallet_id, None);
        assert_eq!(after.status, PackageStatus::Completed);
        assert_eq!(after.sealed_at, None);
        assert!(db.pallets().get(&pallet.id).await.unwrap().is_none());
        assert!(db.cargo().list_by_pallet(&pallet.id).await.unwrap().is_empty());
        assert!(db.pallets().memberships(&pallet.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_package_cascade_returns_members_to_pending() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let engine = db.engine();
        let mut undo = engine.undo_manager(DEFAULT_UNDO_CAPACITY);
        let order = db.orders().create("O-1").await.unwrap();

        let pkg = engine
            .create_package(&mut undo, &order.id, PackingMethod::Mixed, true)
            .await
            .unwrap();
        let a = crate::test_support::component(&db, &order.id, "C-1", None, None).await;
        let b = crate::test_support::component(&db, &order.id, "C-2", None, None).await;
        engine.attach_component(&mut undo, &pkg.id, &a.id).await.unwrap();
        engine.attach_component(&mut undo, &pkg.id, &b.id).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let released = cascade_package_delete(&mut tx, &pkg).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(released, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(db.components().count_pending(&order.id).await.unwrap(), 2);
        assert!(db.packages().get(&pkg.id).await.unwrap().is_none());
    }
}
