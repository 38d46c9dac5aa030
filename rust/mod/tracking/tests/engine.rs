//! End-to-end flow against the persistent redb backend.

use doc::RedbStore;
use linetrack_core::ListParams;
use tracking::service::{CreateUnitInput, MovementFilters, UnitFilters};
use tracking::{IdentityResolver, TrackingConfig, TrackingService};

fn open_service(dir: &tempfile::TempDir) -> TrackingService {
    let store = RedbStore::open(&dir.path().join("floor.redb")).unwrap();
    TrackingService::new(
        Box::new(store),
        Box::new(IdentityResolver),
        TrackingConfig::default(),
    )
    .unwrap()
}

#[test]
fn full_production_flow_on_redb() {
    let dir = tempfile::tempdir().unwrap();
    let svc = open_service(&dir);

    svc.create_unit(CreateUnitInput {
        id: "wau-1001".into(),
        model: "A4".into(),
        color: "red".into(),
        series: Some("2026".into()),
    })
    .unwrap();

    // Two stages, then final completion.
    svc.scan_in("WAU-1001", 1, "alice").unwrap();
    svc.complete_stage("WAU-1001", 1, "alice", None).unwrap();
    svc.scan_in("WAU-1001", 2, "bob").unwrap();
    let unit = svc.complete_stage("WAU-1001", 2, "bob", Some("done")).unwrap();
    assert!(unit.invariant_holds());

    let unit = svc.complete_production("WAU-1001", "alice").unwrap();
    assert!(unit.total_minutes.is_some());

    // The audit trail survived every transition.
    let movements = svc
        .list_movements(&ListParams::default(), &MovementFilters::default())
        .unwrap();
    assert_eq!(movements.total, 4);

    // A clean floor has nothing for the sweeper.
    let report = svc.run_consistency_sweep().unwrap();
    assert_eq!(report.fixed, 0);
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let svc = open_service(&dir);
        svc.create_unit(CreateUnitInput {
            id: "X1".into(),
            model: "Q5".into(),
            color: "blue".into(),
            series: None,
        })
        .unwrap();
        svc.scan_in("X1", 5, "alice").unwrap();
    }

    let svc = open_service(&dir);
    let unit = svc.get_unit("X1").unwrap();
    assert_eq!(unit.current_zone, Some(5));

    let snap = svc.get_zone_snapshot(5).unwrap();
    assert_eq!(snap.current_occupant.as_ref().unwrap().unit, "X1");

    let in_zone = svc
        .list_units(
            &ListParams::default(),
            &UnitFilters { zone: Some(5), ..Default::default() },
        )
        .unwrap();
    assert_eq!(in_zone.total, 1);
}
