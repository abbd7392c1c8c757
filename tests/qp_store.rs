//! Value-store flows: history rotation, cycle detection, type guarding,
//! and block-dispatching mappers.

use mesh_sweep::qp::{ConstValuer, CustomKey, FnValuer, Location, QpStore};
use mesh_sweep::MeshSweepError;

#[test]
fn armed_history_survives_a_shift() {
    let mut store: QpStore = QpStore::new();
    let p1 = store.add("p1", ConstValuer(42.0f64)).unwrap();
    let p2 = store.add("p2", ConstValuer(43.0f64)).unwrap();
    store.want_old("p1").unwrap();
    store.want_old("p2").unwrap();

    let loc = Location::elem(7, 4, 2);
    assert_eq!(store.get::<f64>(p1, &loc).unwrap(), 42.0);
    assert_eq!(store.get::<f64>(p2, &loc).unwrap(), 43.0);
    store.shift().unwrap();
    assert_eq!(store.get_old::<f64>(p1, &loc).unwrap(), 42.0);
    assert_eq!(store.get_old::<f64>(p2, &loc).unwrap(), 43.0);
}

#[test]
fn old_value_tracks_the_last_get_per_location() {
    let mut store: QpStore = QpStore::new();
    let id = store
        .add("ramp", {
            let mut step = 0.0f64;
            FnValuer::new(move |_: &mut QpStore, loc: &Location| {
                step += 1.0;
                Ok(step * 100.0 + loc.elem_id as f64)
            })
        })
        .unwrap();
    store.want_old("ramp").unwrap();

    let l1 = Location::elem(1, 1, 0);
    let l2 = Location::elem(2, 1, 0);
    assert_eq!(store.get::<f64>(id, &l1).unwrap(), 101.0);
    assert_eq!(store.get::<f64>(id, &l2).unwrap(), 202.0);
    // A second observation at l1 replaces the staged value there.
    assert_eq!(store.get::<f64>(id, &l1).unwrap(), 301.0);
    store.shift().unwrap();
    assert_eq!(store.get_old::<f64>(id, &l1).unwrap(), 301.0);
    assert_eq!(store.get_old::<f64>(id, &l2).unwrap(), 202.0);
}

#[test]
fn cyclic_value_chain_is_reported_with_members() {
    let mut store: QpStore = QpStore::with_error_checking();
    store
        .add(
            "p1",
            FnValuer::new(|s: &mut QpStore, l: &Location| {
                Ok(s.get_named::<f64>("p2", l)? + 1.0)
            }),
        )
        .unwrap();
    store
        .add(
            "p2",
            FnValuer::new(|s: &mut QpStore, l: &Location| {
                Ok(s.get_named::<f64>("p3", l)? + 1.0)
            }),
        )
        .unwrap();
    store
        .add(
            "p3",
            FnValuer::new(|s: &mut QpStore, l: &Location| {
                Ok(s.get_named::<f64>("p1", l)? + 1.0)
            }),
        )
        .unwrap();

    let err = store
        .get_named::<f64>("p1", &Location::elem(1, 1, 0))
        .unwrap_err();
    match err {
        MeshSweepError::CyclicValueDependency { cycle } => {
            assert_eq!(cycle, vec!["p1", "p2", "p3", "p1"]);
        }
        other => panic!("expected cycle error, got {other:?}"),
    }
}

#[test]
fn acyclic_value_chain_computes_through_dependencies() {
    let mut store: QpStore = QpStore::with_error_checking();
    store.add("base", ConstValuer(10.0f64)).unwrap();
    let id = store
        .add(
            "derived",
            FnValuer::new(|s: &mut QpStore, l: &Location| {
                Ok(2.0 * s.get_named::<f64>("base", l)?)
            }),
        )
        .unwrap();
    assert_eq!(store.get::<f64>(id, &Location::elem(1, 1, 0)).unwrap(), 20.0);
}

#[test]
fn requesting_the_wrong_type_is_an_error() {
    let mut store: QpStore = QpStore::with_error_checking();
    let id = store.add("kappa", ConstValuer(1.5f64)).unwrap();
    let loc = Location::elem(1, 1, 0);
    let err = store.get::<i64>(id, &loc).unwrap_err();
    assert_eq!(
        err,
        MeshSweepError::TypeMismatch {
            value: "kappa".into(),
            stored: "f64",
            requested: "i64",
        }
    );
    // The same guard covers history retrievals.
    assert!(matches!(
        store.get_old::<i64>(id, &loc),
        Err(MeshSweepError::TypeMismatch { .. })
    ));
}

#[test]
fn mapper_dispatches_by_block() {
    let mut store: QpStore = QpStore::new();
    let steel = store.add("kappa-steel", ConstValuer(15.0f64)).unwrap();
    let oxide = store.add("kappa-oxide", ConstValuer(2.0f64)).unwrap();
    store
        .add_mapper("kappa", move |loc| match loc.block_id {
            0..=5 => Ok(steel),
            6..=8 => Ok(oxide),
            other => Err(MeshSweepError::MissingMapping {
                value: "kappa".into(),
                block: other,
            }),
        })
        .unwrap();

    let at = |block| Location::elem(1, 1, 0).in_block(block);
    assert_eq!(store.get_named::<f64>("kappa", &at(4)).unwrap(), 15.0);
    assert_eq!(store.get_named::<f64>("kappa", &at(6)).unwrap(), 2.0);
    assert_eq!(
        store.get_named::<f64>("kappa", &at(9)).unwrap_err(),
        MeshSweepError::MissingMapping {
            value: "kappa".into(),
            block: 9,
        }
    );
}

#[test]
fn custom_key_policy_addresses_by_custom_field() {
    // Per-node addressing: two locations with the same `custom` component
    // share one history entry regardless of element.
    let mut store: QpStore<CustomKey> = QpStore::new();
    let id = store.add("nodal-val", ConstValuer(1.0f64)).unwrap();
    store.want_old("nodal-val").unwrap();
    let at_node = Location::elem(1, 1, 0).with_custom(5);
    let same_node_elsewhere = Location::elem(99, 1, 0).with_custom(5);
    store.get::<f64>(id, &at_node).unwrap();
    store.shift().unwrap();
    assert_eq!(
        store.get_old::<f64>(id, &same_node_elsewhere).unwrap(),
        1.0
    );
}

#[test]
fn mappers_chain_to_their_target() {
    let mut store: QpStore = QpStore::new();
    let concrete = store.add("v", ConstValuer(7.0f64)).unwrap();
    let alias = store.add_mapper("alias", move |_| Ok(concrete)).unwrap();
    let alias2 = store.add_mapper("alias2", move |_| Ok(alias)).unwrap();
    assert_eq!(
        store.get::<f64>(alias2, &Location::elem(1, 1, 0)).unwrap(),
        7.0
    );
}
