//! Engine-level scenarios against an in-memory store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::LifecycleEngine;
use crate::error::{DbError, EngineError};
use crate::pool::{Database, DbConfig};
use crate::scan::ScanPipeline;
use crate::test_support::component;
use crate::undo::UndoManager;
use packline_core::{
    ComponentStatus, CoreError, LifecycleEvent, LifecycleObserver, Order, PackageStatus,
    PackingMethod, PalletStatus, ScanConfig, ValidationError, DEFAULT_UNDO_CAPACITY,
};

struct Station {
    db: Database,
    engine: LifecycleEngine,
    undo: UndoManager,
    order: Order,
}

async fn station() -> Station {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let engine = db.engine();
    let undo = engine.undo_manager(DEFAULT_UNDO_CAPACITY);
    let order = db.orders().create("Kitchen Smith").await.unwrap();
    Station {
        db,
        engine,
        undo,
        order,
    }
}

fn rule(err: EngineError) -> CoreError {
    match err {
        EngineError::Rule(e) => e,
        other => panic!("expected a rule violation, got {other:?}"),
    }
}

/// Membership flags agree with `package_id`, and cached counts match.
async fn assert_consistent(s: &Station) {
    for c in s.db.components().list_by_order(&s.order.id).await.unwrap() {
        assert!(c.is_consistent(), "component {} is inconsistent", c.code);
    }
    for p in s.db.packages().list_by_order(&s.order.id).await.unwrap() {
        let members = s.db.components().list_by_package(&p.id).await.unwrap();
        assert_eq!(p.component_count, members.len() as i64, "package {}", p.package_number);
    }
}

/// A completed package holding `codes`.
async fn completed_package(s: &mut Station, codes: &[&str]) -> String {
    let pkg = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();
    for code in codes {
        let c = component(&s.db, &s.order.id, code, None, None).await;
        s.engine.attach_component(&mut s.undo, &pkg.id, &c.id).await.unwrap();
    }
    s.engine.complete_package(&mut s.undo, &pkg.id).await.unwrap();
    pkg.id
}

#[derive(Default)]
struct Recorder(Mutex<Vec<LifecycleEvent>>);

impl LifecycleObserver for Recorder {
    fn on_event(&self, event: &LifecycleEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

// =============================================================================
// Package lifecycle
// =============================================================================

#[tokio::test]
async fn test_complete_then_two_undos() {
    let mut s = station().await;
    let pkg = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();
    let a = component(&s.db, &s.order.id, "C-1", None, None).await;
    let b = component(&s.db, &s.order.id, "C-2", None, None).await;
    s.engine.attach_component(&mut s.undo, &pkg.id, &a.id).await.unwrap();
    s.engine.attach_component(&mut s.undo, &pkg.id, &b.id).await.unwrap();
    s.engine.complete_package(&mut s.undo, &pkg.id).await.unwrap();

    // create + complete; direct attaches are audit-only
    assert_eq!(s.undo.len(), 2);

    s.undo.undo().await.unwrap();
    let reopened = s.db.packages().get(&pkg.id).await.unwrap().unwrap();
    assert_eq!(reopened.status, PackageStatus::Open);
    assert!(reopened.completed_at.is_none());
    assert_eq!(reopened.component_count, 2);

    s.undo.undo().await.unwrap();
    assert!(s.db.packages().get(&pkg.id).await.unwrap().is_none());
    assert_eq!(s.db.components().count_pending(&s.order.id).await.unwrap(), 2);
    assert_consistent(&s).await;
}

#[tokio::test]
async fn test_empty_package_cannot_complete() {
    let mut s = station().await;
    let pkg = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();

    let err = rule(s.engine.complete_package(&mut s.undo, &pkg.id).await.unwrap_err());
    assert!(matches!(err, CoreError::EmptyPackage { .. }));
    let after = s.db.packages().get(&pkg.id).await.unwrap().unwrap();
    assert_eq!(after.status, PackageStatus::Open);
}

#[tokio::test]
async fn test_attach_already_packed_changes_nothing() {
    let mut s = station().await;
    let first = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();
    let second = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();
    let c = component(&s.db, &s.order.id, "C-1", None, None).await;
    s.engine.attach_component(&mut s.undo, &first.id, &c.id).await.unwrap();
    let logged = s.db.operation_log().count().await.unwrap();

    let err = rule(
        s.engine
            .attach_component(&mut s.undo, &second.id, &c.id)
            .await
            .unwrap_err(),
    );
    match err {
        CoreError::AlreadyPacked { package_number, .. } => {
            assert_eq!(package_number, first.package_number)
        }
        other => panic!("unexpected {other:?}"),
    }

    let c = s.db.components().get(&c.id).await.unwrap().unwrap();
    assert_eq!(c.package_id.as_deref(), Some(first.id.as_str()));
    let second = s.db.packages().get(&second.id).await.unwrap().unwrap();
    assert_eq!(second.component_count, 0);
    assert_eq!(s.db.operation_log().count().await.unwrap(), logged);
}

#[tokio::test]
async fn test_attach_across_orders_is_rejected() {
    let mut s = station().await;
    let other = s.db.orders().create("Bath Jones").await.unwrap();
    let pkg = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();
    let foreign = component(&s.db, &other.id, "F-1", None, None).await;

    let err = rule(
        s.engine
            .attach_component(&mut s.undo, &pkg.id, &foreign.id)
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, CoreError::OrderMismatch { .. }));
}

#[tokio::test]
async fn test_by_cabinet_requires_same_room_and_cabinet() {
    let mut s = station().await;
    let pkg = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::ByCabinet, true)
        .await
        .unwrap();
    let a = component(&s.db, &s.order.id, "A", Some("R1"), Some("K1")).await;
    let b = component(&s.db, &s.order.id, "B", Some("R1"), Some("K2")).await;
    let c = component(&s.db, &s.order.id, "C", Some("R1"), Some("K1")).await;

    s.engine.attach_component(&mut s.undo, &pkg.id, &a.id).await.unwrap();
    let err = rule(s.engine.attach_component(&mut s.undo, &pkg.id, &b.id).await.unwrap_err());
    assert!(matches!(err, CoreError::MethodMismatch { .. }));
    let pkg = s.engine.attach_component(&mut s.undo, &pkg.id, &c.id).await.unwrap();
    assert_eq!(pkg.component_count, 2);
}

#[tokio::test]
async fn test_detach_and_undo_reattaches() {
    let mut s = station().await;
    let pkg = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();
    let c = component(&s.db, &s.order.id, "C-1", None, None).await;
    s.engine.attach_component(&mut s.undo, &pkg.id, &c.id).await.unwrap();

    let after = s.engine.detach_component(&mut s.undo, &c.id).await.unwrap();
    assert_eq!(after.component_count, 0);
    let err = rule(s.engine.detach_component(&mut s.undo, &c.id).await.unwrap_err());
    assert!(matches!(err, CoreError::NotPacked { .. }));

    s.undo.undo().await.unwrap();
    let c = s.db.components().get(&c.id).await.unwrap().unwrap();
    assert_eq!(c.status, ComponentStatus::Packed);
    assert_eq!(c.package_id.as_deref(), Some(pkg.id.as_str()));
    assert_consistent(&s).await;
}

#[tokio::test]
async fn test_seal_unseal_and_reopen_paths() {
    let mut s = station().await;
    let id = completed_package(&mut s, &["C-1"]).await;

    let err = rule(s.engine.unseal_package(&mut s.undo, &id).await.unwrap_err());
    assert!(matches!(err, CoreError::InvalidTransition { action: "unseal", .. }));

    let sealed = s.engine.seal_package(&mut s.undo, &id).await.unwrap();
    assert!(sealed.sealed_at.is_some());
    let err = rule(s.engine.reopen_package(&mut s.undo, &id).await.unwrap_err());
    assert!(matches!(err, CoreError::InvalidTransition { action: "reopen", .. }));

    let open = s.engine.unseal_package(&mut s.undo, &id).await.unwrap();
    assert_eq!(open.status, PackageStatus::Open);
    assert!(open.sealed_at.is_none());
    assert!(open.completed_at.is_none());

    s.undo.undo().await.unwrap();
    let back = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(back.status, PackageStatus::Sealed);

    s.undo.undo().await.unwrap();
    let back = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(back.status, PackageStatus::Completed);
    assert!(back.sealed_at.is_none());

    let reopened = s.engine.reopen_package(&mut s.undo, &id).await.unwrap();
    assert_eq!(reopened.status, PackageStatus::Open);
    s.undo.undo().await.unwrap();
    let back = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(back.status, PackageStatus::Completed);
    assert!(back.completed_at.is_some());
}

#[tokio::test]
async fn test_delete_package_and_undo_restores_members() {
    let mut s = station().await;
    let id = completed_package(&mut s, &["C-1", "C-2"]).await;
    let before = s.db.packages().get(&id).await.unwrap().unwrap();

    s.engine.delete_package(&mut s.undo, &id).await.unwrap();
    assert!(s.db.packages().get(&id).await.unwrap().is_none());
    assert_eq!(s.db.components().count_pending(&s.order.id).await.unwrap(), 2);

    s.undo.undo().await.unwrap();
    let restored = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(restored.package_number, before.package_number);
    assert_eq!(restored.sequence_index, before.sequence_index);
    assert_eq!(restored.status, PackageStatus::Completed);
    assert_eq!(restored.component_count, 2);
    assert_consistent(&s).await;
}

#[tokio::test]
async fn test_sequence_index_reuses_gap() {
    let mut s = station().await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        let p = s
            .engine
            .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
            .await
            .unwrap();
        ids.push(p);
    }
    assert_eq!(ids.iter().map(|p| p.sequence_index).collect::<Vec<_>>(), vec![1, 2, 3]);

    s.engine.delete_package(&mut s.undo, &ids[1].id).await.unwrap();
    let refill = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();
    assert_eq!(refill.sequence_index, 2);
    assert_ne!(refill.package_number, ids[1].package_number);
}

#[tokio::test]
async fn test_missing_rows_are_not_found() {
    let mut s = station().await;
    let err = rule(s.engine.complete_package(&mut s.undo, "nope").await.unwrap_err());
    assert!(matches!(err, CoreError::PackageNotFound(_)));

    let err = rule(
        s.engine
            .create_package(&mut s.undo, "no-order", PackingMethod::Mixed, true)
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, CoreError::OrderNotFound(_)));

    let err = rule(s.engine.remove_cargo(&mut s.undo, "nope").await.unwrap_err());
    assert!(matches!(err, CoreError::CargoNotFound(_)));
    assert!(s.undo.is_empty());
}

#[tokio::test]
async fn test_unrenderable_date_format_fails_cleanly() {
    let mut s = station().await;
    s.db.settings().set("numbering.date_format", "%Y%m%d%H").await.unwrap();

    let err = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(DbError::Corrupt { .. })));

    let err = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap_err();
    assert!(matches!(err, EngineError::Store(DbError::Corrupt { .. })));

    assert!(s.db.packages().list_by_order(&s.order.id).await.unwrap().is_empty());
    assert!(s.undo.is_empty());
}

// =============================================================================
// Pallets
// =============================================================================

#[tokio::test]
async fn test_pallet_index_reuses_gap() {
    let mut s = station().await;
    let mut pallets = Vec::new();
    for is_virtual in [false, true, false] {
        let p = s
            .engine
            .create_pallet(&mut s.undo, &s.order.id, is_virtual)
            .await
            .unwrap();
        pallets.push(p);
    }
    assert_eq!(pallets.iter().map(|p| p.sequence_index).collect::<Vec<_>>(), vec![1, 2, 3]);

    s.engine.delete_pallet(&mut s.undo, &pallets[1].id).await.unwrap();
    let refill = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap();
    assert_eq!(refill.sequence_index, 2);
    assert!(!refill.is_virtual);
    assert_ne!(refill.pallet_number, pallets[0].pallet_number);
    assert_ne!(refill.pallet_number, pallets[2].pallet_number);

    let next = s.engine.create_pallet(&mut s.undo, &s.order.id, true).await.unwrap();
    assert_eq!(next.sequence_index, 4);
}

#[tokio::test]
async fn test_palletizing_seals_completed_package() {
    let mut s = station().await;
    let id = completed_package(&mut s, &["C-1"]).await;
    let pallet = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap();
    assert!(pallet.pallet_number.starts_with('T'));

    let pkg = s.engine.add_package_to_pallet(&mut s.undo, &pallet.id, &id).await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Sealed);
    assert_eq!(pkg.pallet_id.as_deref(), Some(pallet.id.as_str()));
    assert_eq!(s.db.pallets().memberships(&pallet.id).await.unwrap().len(), 1);

    let err = rule(s.engine.reopen_package(&mut s.undo, &id).await.unwrap_err());
    assert!(matches!(err, CoreError::InvalidTransition { .. } | CoreError::PalletAssigned { .. }));
    let err = rule(s.engine.delete_package(&mut s.undo, &id).await.unwrap_err());
    assert!(matches!(err, CoreError::PalletAssigned { .. }));

    s.undo.undo().await.unwrap();
    let back = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(back.status, PackageStatus::Completed);
    assert!(back.sealed_at.is_none());
    assert!(back.pallet_id.is_none());
    assert!(s.db.pallets().memberships(&pallet.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_palletize_preconditions() {
    let mut s = station().await;
    let open = s
        .engine
        .create_package(&mut s.undo, &s.order.id, PackingMethod::Mixed, true)
        .await
        .unwrap();
    let pallet = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap();

    let err = rule(
        s.engine
            .add_package_to_pallet(&mut s.undo, &pallet.id, &open.id)
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, CoreError::PackageNotSealable { .. }));

    let other_order = s.db.orders().create("Bath Jones").await.unwrap();
    let foreign = s.engine.create_pallet(&mut s.undo, &other_order.id, true).await.unwrap();
    assert!(foreign.pallet_number.starts_with("VT"));
    let id = completed_package(&mut s, &["C-1"]).await;
    let err = rule(
        s.engine
            .add_package_to_pallet(&mut s.undo, &foreign.id, &id)
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, CoreError::OrderMismatch { .. }));

    s.engine.seal_pallet(&mut s.undo, &pallet.id).await.unwrap();
    let err = rule(
        s.engine
            .add_package_to_pallet(&mut s.undo, &pallet.id, &id)
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, CoreError::PalletNotOpen { .. }));
}

#[tokio::test]
async fn test_seal_then_unseal_keeps_membership() {
    let mut s = station().await;
    let id = completed_package(&mut s, &["C-1"]).await;
    let pallet = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap();
    s.engine.add_package_to_pallet(&mut s.undo, &pallet.id, &id).await.unwrap();

    let sealed = s.engine.seal_pallet(&mut s.undo, &pallet.id).await.unwrap();
    assert_eq!(sealed.status, PalletStatus::Sealed);
    let open = s.engine.unseal_pallet(&mut s.undo, &pallet.id).await.unwrap();
    assert_eq!(open.status, PalletStatus::Open);
    assert!(open.sealed_at.is_none());

    let members = s.db.packages().list_by_pallet(&pallet.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].status, PackageStatus::Sealed);

    let err = rule(s.engine.unseal_pallet(&mut s.undo, &pallet.id).await.unwrap_err());
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_remove_from_sealed_pallet_unseals_first() {
    let mut s = station().await;
    let id = completed_package(&mut s, &["C-1"]).await;
    let pallet = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap();
    s.engine.add_package_to_pallet(&mut s.undo, &pallet.id, &id).await.unwrap();
    s.engine.seal_pallet(&mut s.undo, &pallet.id).await.unwrap();
    let depth = s.undo.len();

    let pkg = s.engine.remove_package_from_pallet(&mut s.undo, &id).await.unwrap();
    assert_eq!(pkg.status, PackageStatus::Completed);
    assert!(pkg.pallet_id.is_none());
    assert_eq!(s.undo.len(), depth + 2);
    let p = s.db.pallets().get(&pallet.id).await.unwrap().unwrap();
    assert_eq!(p.status, PalletStatus::Open);

    let err = rule(s.engine.remove_package_from_pallet(&mut s.undo, &id).await.unwrap_err());
    assert!(matches!(err, CoreError::NotOnPallet { .. }));

    s.undo.undo().await.unwrap();
    let pkg = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(pkg.status, PackageStatus::Sealed);
    assert_eq!(pkg.pallet_id.as_deref(), Some(pallet.id.as_str()));

    s.undo.undo().await.unwrap();
    let p = s.db.pallets().get(&pallet.id).await.unwrap().unwrap();
    assert_eq!(p.status, PalletStatus::Sealed);
}

#[tokio::test]
async fn test_closed_pallet_is_frozen() {
    let mut s = station().await;
    let id = completed_package(&mut s, &["C-1"]).await;
    let pallet = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap();
    s.engine.add_package_to_pallet(&mut s.undo, &pallet.id, &id).await.unwrap();

    let err = rule(s.engine.close_pallet(&mut s.undo, &pallet.id).await.unwrap_err());
    assert!(matches!(err, CoreError::InvalidTransition { action: "close", .. }));

    s.engine.seal_pallet(&mut s.undo, &pallet.id).await.unwrap();
    let closed = s.engine.close_pallet(&mut s.undo, &pallet.id).await.unwrap();
    assert_eq!(closed.status, PalletStatus::Closed);

    let err = rule(s.engine.remove_package_from_pallet(&mut s.undo, &id).await.unwrap_err());
    assert!(matches!(err, CoreError::PalletNotOpen { .. }));
    let err = rule(s.engine.delete_pallet(&mut s.undo, &pallet.id).await.unwrap_err());
    assert!(matches!(err, CoreError::InvalidTransition { action: "delete", .. }));

    s.undo.undo().await.unwrap();
    let p = s.db.pallets().get(&pallet.id).await.unwrap().unwrap();
    assert_eq!(p.status, PalletStatus::Sealed);
}

#[tokio::test]
async fn test_delete_pallet_and_undo_restores_contents() {
    let mut s = station().await;
    let id = completed_package(&mut s, &["C-1"]).await;
    let pallet = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap();
    s.engine.add_package_to_pallet(&mut s.undo, &pallet.id, &id).await.unwrap();
    let item = s
        .engine
        .add_cargo(&mut s.undo, &pallet.id, " Hinge box ", 2.0, "pcs")
        .await
        .unwrap();
    assert_eq!(item.name, "Hinge box");

    s.engine.delete_pallet(&mut s.undo, &pallet.id).await.unwrap();
    let pkg = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(pkg.status, PackageStatus::Completed);
    assert!(pkg.pallet_id.is_none());

    s.undo.undo().await.unwrap();
    let restored = s.db.pallets().get(&pallet.id).await.unwrap().unwrap();
    assert_eq!(restored.pallet_number, pallet.pallet_number);
    let pkg = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(pkg.status, PackageStatus::Sealed);
    assert_eq!(pkg.pallet_id.as_deref(), Some(pallet.id.as_str()));
    assert_eq!(s.db.cargo().list_by_pallet(&pallet.id).await.unwrap(), vec![item]);
}

#[tokio::test]
async fn test_cargo_rules() {
    let mut s = station().await;
    let pallet = s.engine.create_pallet(&mut s.undo, &s.order.id, true).await.unwrap();

    let err = rule(s.engine.add_cargo(&mut s.undo, &pallet.id, "  ", 1.0, "pcs").await.unwrap_err());
    assert!(matches!(err, CoreError::Validation(ValidationError::Required { .. })));
    let err = rule(s.engine.add_cargo(&mut s.undo, &pallet.id, "Manual", 0.0, "pcs").await.unwrap_err());
    assert!(matches!(err, CoreError::Validation(ValidationError::MustBePositive { .. })));

    let item = s
        .engine
        .add_cargo(&mut s.undo, &pallet.id, "Manual", 1.0, "pcs")
        .await
        .unwrap();
    s.engine.seal_pallet(&mut s.undo, &pallet.id).await.unwrap();
    let err = rule(s.engine.remove_cargo(&mut s.undo, &item.id).await.unwrap_err());
    assert!(matches!(err, CoreError::PalletNotOpen { .. }));

    s.engine.unseal_pallet(&mut s.undo, &pallet.id).await.unwrap();
    s.engine.remove_cargo(&mut s.undo, &item.id).await.unwrap();
    assert!(s.db.cargo().list_by_pallet(&pallet.id).await.unwrap().is_empty());

    s.undo.undo().await.unwrap();
    assert_eq!(s.db.cargo().list_by_pallet(&pallet.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_undo_create_pallet_releases_members() {
    let mut s = station().await;
    let pallet = s.engine.create_pallet(&mut s.undo, &s.order.id, false).await.unwrap();
    let mut side = s.engine.undo_manager(DEFAULT_UNDO_CAPACITY);
    let id = completed_package(&mut s, &["C-1"]).await;
    s.engine.add_package_to_pallet(&mut side, &pallet.id, &id).await.unwrap();

    // Pop complete_package, create_package (conflicts: package is on a pallet)
    // down to create_pallet.
    s.undo.undo().await.unwrap_err();
    s.undo.undo().await.unwrap_err();
    s.undo.undo().await.unwrap();

    assert!(s.db.pallets().get(&pallet.id).await.unwrap().is_none());
    let pkg = s.db.packages().get(&id).await.unwrap().unwrap();
    assert_eq!(pkg.status, PackageStatus::Completed);
    assert!(pkg.pallet_id.is_none());
}

// =============================================================================
// Observers
// =============================================================================

#[tokio::test]
async fn test_observers_hear_only_committed_changes() {
    let s = station().await;
    let recorder = Arc::new(Recorder::default());
    let engine = s.engine.clone().with_observer(recorder.clone());
    let mut undo = engine.undo_manager(DEFAULT_UNDO_CAPACITY);

    let pkg = engine
        .create_package(&mut undo, &s.order.id, PackingMethod::ByRoom, false)
        .await
        .unwrap();
    let a = component(&s.db, &s.order.id, "A", Some("R1"), None).await;
    component(&s.db, &s.order.id, "B", Some("R2"), None).await;
    let pipeline = ScanPipeline::new(engine.clone(), ScanConfig::passthrough("plain")).unwrap();

    pipeline.scan(&mut undo, &pkg.id, "A").await.unwrap();
    pipeline.scan(&mut undo, &pkg.id, "B").await.unwrap_err();
    pipeline.scan(&mut undo, &pkg.id, "A").await.unwrap_err();

    {
        let events = recorder.0.lock().unwrap();
        assert_eq!(
            *events,
            vec![LifecycleEvent::ComponentScanned {
                order_id: s.order.id.clone(),
                package_id: pkg.id.clone(),
                component_id: a.id.clone(),
            }]
        );
    }

    undo.undo().await.unwrap();
    let events = recorder.0.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        LifecycleEvent::ComponentsDetached {
            order_id: s.order.id.clone(),
            component_ids: vec![a.id.clone()],
        }
    );
}

// =============================================================================
// Concurrent Stations
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stations_queue_for_the_write_lock() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("line.db")).max_connections(4))
        .await
        .unwrap();
    let order = db.orders().create("Kitchen Smith").await.unwrap();

    let mut stations = Vec::new();
    for _ in 0..8 {
        let engine = db.engine();
        let order_id = order.id.clone();
        stations.push(tokio::spawn(async move {
            let mut undo = engine.undo_manager(DEFAULT_UNDO_CAPACITY);
            let pkg = engine
                .create_package(&mut undo, &order_id, PackingMethod::Mixed, true)
                .await?;
            let pallet = engine.create_pallet(&mut undo, &order_id, false).await?;
            undo.undo().await?;
            Ok::<_, EngineError>((pkg, pallet))
        }));
    }

    let mut indices = Vec::new();
    let mut numbers = HashSet::new();
    for station in stations {
        let (pkg, _) = station.await.unwrap().unwrap();
        indices.push(pkg.sequence_index);
        assert!(numbers.insert(pkg.package_number));
    }
    indices.sort_unstable();
    assert_eq!(indices, (1..=8).collect::<Vec<i64>>());

    // Every station undid its own pallet.
    assert_eq!(db.pallets().count_by_order(&order.id).await.unwrap(), 0);
    assert_eq!(db.packages().count_by_order(&order.id).await.unwrap(), 8);
    db.close().await;
}
