//! Pallet and cargo operations.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::{
    cascade_pallet_delete, ensure_order, load_cargo, load_package, load_pallet, pallet_number_of,
    Journal, LifecycleEngine,
};
use crate::error::EngineResult;
use crate::identity;
use crate::repository::{cargo, package as package_repo, pallet as pallet_repo, settings};
use crate::undo::UndoManager;
use packline_core::validation::{validate_cargo_name, validate_cargo_quantity, validate_unit};
use packline_core::{
    rules, CoreError, Operation, Package, PackageStatus, Pallet, PalletStatus, VirtualItem,
};

impl LifecycleEngine {
    /// Creates an empty open pallet. Physical and virtual pallets share the
    /// order's sequence but are numbered with different prefixes.
    pub async fn create_pallet(
        &self,
        undo: &mut UndoManager,
        order_id: &str,
        is_virtual: bool,
    ) -> EngineResult<Pallet> {
        let mut tx = self.begin().await?;
        ensure_order(&mut tx, order_id).await?;

        let format = settings::number_format(&mut tx).await?;
        let pallet_number =
            identity::new_pallet_number(&mut tx, &format, is_virtual, identity::today()).await?;
        let sequence_index = identity::next_pallet_index(&mut tx, order_id).await?;

        let now = Utc::now();
        let pallet = Pallet {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            pallet_number,
            sequence_index,
            is_virtual,
            status: PalletStatus::Open,
            sealed_at: None,
            created_at: now,
            updated_at: now,
        };
        pallet_repo::insert(&mut tx, &pallet).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::CreatePallet {
                pallet_id: pallet.id.clone(),
            },
            format!("Created pallet {}", pallet.pallet_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(pallet_id = %pallet.id, number = %pallet.pallet_number, "Pallet created");
        Ok(pallet)
    }

    /// Loads a completed or sealed package onto an open pallet. A completed
    /// package is sealed on the way.
    pub async fn add_package_to_pallet(
        &self,
        undo: &mut UndoManager,
        pallet_id: &str,
        package_id: &str,
    ) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        let pallet = load_pallet(&mut tx, pallet_id).await?;
        let mut package = load_package(&mut tx, package_id).await?;
        let current = pallet_number_of(&mut tx, &package).await?;
        rules::ensure_can_palletize(&package, &pallet, current.as_deref())?;

        let previous_status = package.status;
        if package.status == PackageStatus::Completed {
            package.status = PackageStatus::Sealed;
            package.sealed_at = Some(Utc::now());
        }
        package.pallet_id = Some(pallet.id.clone());
        package_repo::update(&mut tx, &package).await?;
        pallet_repo::link(&mut tx, &pallet.id, &package.id).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::AddPackageToPallet {
                pallet_id: pallet.id.clone(),
                package_id: package.id.clone(),
                previous_status,
            },
            format!("Loaded package {} onto pallet {}", package.package_number, pallet.pallet_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(package = %package.package_number, pallet = %pallet.pallet_number, "Package palletized");
        Ok(package)
    }

    /// Takes a package off its pallet; it comes back as `completed`.
    ///
    /// A sealed pallet is unsealed first. That unseal is logged as its own
    /// entry, so undo replays the two steps separately.
    pub async fn remove_package_from_pallet(
        &self,
        undo: &mut UndoManager,
        package_id: &str,
    ) -> EngineResult<Package> {
        let mut tx = self.begin().await?;
        let mut package = load_package(&mut tx, package_id).await?;
        let Some(pallet_id) = package.pallet_id.clone() else {
            return Err(CoreError::NotOnPallet {
                package_number: package.package_number,
            }
            .into());
        };
        let mut pallet = load_pallet(&mut tx, &pallet_id).await?;
        rules::ensure_can_remove_from(&pallet)?;

        let mut journal = Journal::default();

        if pallet.status == PalletStatus::Sealed {
            pallet.status = PalletStatus::Open;
            pallet.sealed_at = None;
            pallet_repo::update(&mut tx, &pallet).await?;
            journal.log(
                Operation::UnsealPallet {
                    pallet_id: pallet.id.clone(),
                },
                format!("Unsealed pallet {} to remove a package", pallet.pallet_number),
            );
        }

        let previous_status = package.status;
        package.pallet_id = None;
        package.status = PackageStatus::Completed;
        package.sealed_at = None;
        package_repo::update(&mut tx, &package).await?;
        pallet_repo::unlink(&mut tx, &pallet.id, &package.id).await?;

        journal.log(
            Operation::RemovePackageFromPallet {
                pallet_id: pallet.id.clone(),
                package_id: package.id.clone(),
                previous_status,
            },
            format!("Removed package {} from pallet {}", package.package_number, pallet.pallet_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(package = %package.package_number, pallet = %pallet.pallet_number, "Package removed from pallet");
        Ok(package)
    }

    pub async fn seal_pallet(&self, undo: &mut UndoManager, pallet_id: &str) -> EngineResult<Pallet> {
        let mut tx = self.begin().await?;
        let mut pallet = load_pallet(&mut tx, pallet_id).await?;
        rules::ensure_pallet_open(&pallet)?;

        pallet.status = PalletStatus::Sealed;
        pallet.sealed_at = Some(Utc::now());
        pallet_repo::update(&mut tx, &pallet).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::SealPallet {
                pallet_id: pallet.id.clone(),
            },
            format!("Sealed pallet {}", pallet.pallet_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(pallet = %pallet.pallet_number, "Pallet sealed");
        Ok(pallet)
    }

    /// Reopens a sealed pallet. Member packages keep their status.
    pub async fn unseal_pallet(&self, undo: &mut UndoManager, pallet_id: &str) -> EngineResult<Pallet> {
        let mut tx = self.begin().await?;
        let mut pallet = load_pallet(&mut tx, pallet_id).await?;
        rules::ensure_can_unseal_pallet(&pallet)?;

        pallet.status = PalletStatus::Open;
        pallet.sealed_at = None;
        pallet_repo::update(&mut tx, &pallet).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::UnsealPallet {
                pallet_id: pallet.id.clone(),
            },
            format!("Unsealed pallet {}", pallet.pallet_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(pallet = %pallet.pallet_number, "Pallet unsealed");
        Ok(pallet)
    }

    /// Marks a sealed pallet as dispatched. Closed pallets are frozen.
    pub async fn close_pallet(&self, undo: &mut UndoManager, pallet_id: &str) -> EngineResult<Pallet> {
        let mut tx = self.begin().await?;
        let mut pallet = load_pallet(&mut tx, pallet_id).await?;
        rules::ensure_can_close_pallet(&pallet)?;

        pallet.status = PalletStatus::Closed;
        pallet_repo::update(&mut tx, &pallet).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::ClosePallet {
                pallet_id: pallet.id.clone(),
            },
            format!("Closed pallet {}", pallet.pallet_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(pallet = %pallet.pallet_number, "Pallet closed");
        Ok(pallet)
    }

    /// Deletes an open or sealed pallet. Members come off as `completed`;
    /// cargo is dropped.
    pub async fn delete_pallet(&self, undo: &mut UndoManager, pallet_id: &str) -> EngineResult<()> {
        let mut tx = self.begin().await?;
        let pallet = load_pallet(&mut tx, pallet_id).await?;
        rules::ensure_can_delete_pallet(&pallet)?;

        let contents = cascade_pallet_delete(&mut tx, &pallet).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::DeletePallet {
                pallet: pallet.clone(),
                members: contents.members.clone(),
                cargo: contents.cargo.clone(),
            },
            format!(
                "Deleted pallet {} ({} packages, {} cargo items)",
                pallet.pallet_number,
                contents.members.len(),
                contents.cargo.len()
            ),
        );
        self.commit(tx, undo, journal).await?;

        info!(pallet = %pallet.pallet_number, "Pallet deleted");
        Ok(())
    }

    /// Adds a non-component cargo line to an open pallet.
    pub async fn add_cargo(
        &self,
        undo: &mut UndoManager,
        pallet_id: &str,
        name: &str,
        quantity: f64,
        unit: &str,
    ) -> EngineResult<VirtualItem> {
        let name = validate_cargo_name(name)?;
        let unit = validate_unit(unit)?;
        validate_cargo_quantity(quantity)?;

        let mut tx = self.begin().await?;
        let pallet = load_pallet(&mut tx, pallet_id).await?;
        rules::ensure_pallet_open(&pallet)?;

        let item = VirtualItem {
            id: Uuid::new_v4().to_string(),
            pallet_id: pallet.id.clone(),
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
            created_at: Utc::now(),
        };
        cargo::insert(&mut tx, &item).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::AddCargo { item: item.clone() },
            format!("Added {} {} {} to pallet {}", item.quantity, item.unit, item.name, pallet.pallet_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(pallet = %pallet.pallet_number, item = %item.name, "Cargo added");
        Ok(item)
    }

    pub async fn remove_cargo(&self, undo: &mut UndoManager, item_id: &str) -> EngineResult<()> {
        let mut tx = self.begin().await?;
        let item = load_cargo(&mut tx, item_id).await?;
        let pallet = load_pallet(&mut tx, &item.pallet_id).await?;
        rules::ensure_pallet_open(&pallet)?;

        cargo::delete(&mut tx, &item.id).await?;

        let mut journal = Journal::default();
        journal.log(
            Operation::RemoveCargo { item: item.clone() },
            format!("Removed {} from pallet {}", item.name, pallet.pallet_number),
        );
        self.commit(tx, undo, journal).await?;

        info!(pallet = %pallet.pallet_number, item = %item.name, "Cargo removed");
        Ok(())
    }
}
