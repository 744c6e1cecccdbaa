//! Test that eject removes secondary entries of every kind.

use crate::config::StoreConfig;
use crate::migrator::{Migrator, MigratorError};
use crate::testing::{name, new_lenient_migrator, new_test_migrator};
use crate::types::{Digest256, ExtendedFloat, Identity};

#[test]
fn test_eject_sweeps_every_kind() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("votes"), name("eosio"), name("dave"));

    for id in 1..=3 {
        migrator.inject(t, s, p, id, &id.to_le_bytes()).expect("inject");
        migrator.idx_u64(t, s, p, id, id).expect("idx64");
        migrator.idx_u128(t, s, p, id, u128::from(id)).expect("idx128");
        migrator
            .idx_digest256(t, s, p, id, Digest256::new(u128::from(id), 0))
            .expect("idx256");
        migrator.idx_f64(t, s, p, id, -1.5).expect("idx_double");
        migrator
            .idx_f80(t, s, p, id, ExtendedFloat::from_f64(0.25))
            .expect("idx_long_double");
    }

    migrator.eject(p, t, s, 2).expect("eject");

    let gone = Identity::new(t, s, 2);
    assert!(migrator.index_entries(&gone).expect("entries").is_empty());
    assert_eq!(migrator.index_u64().len(), 2);
    assert_eq!(migrator.index_u128().len(), 2);
    assert_eq!(migrator.index_digest256().len(), 2);
    assert_eq!(migrator.index_f64().find(t, s, &-1.5).expect("query"), vec![1, 3]);
    assert_eq!(
        migrator
            .index_f80()
            .find(t, s, &ExtendedFloat::from_f64(0.25))
            .expect("query"),
        vec![1, 3]
    );
}

#[test]
fn test_strict_eject_of_absent_record() {
    let mut migrator = new_test_migrator();
    let err = migrator
        .eject(name("a"), name("t"), name("s"), 9)
        .expect_err("absent");
    assert_eq!(err, MigratorError::NotFound(Identity::new(name("t"), name("s"), 9)));
}

#[test]
fn test_lenient_eject_sweeps_strays() {
    let mut migrator = new_lenient_migrator();
    let (t, s, p) = (name("t"), name("s"), name("p"));

    migrator.idx_u64(t, s, p, 9, 1).expect("stray");
    migrator.idx_f64(t, s, p, 9, 2.0).expect("stray");
    assert!(migrator.ledger().usage(p) > 0);

    migrator.eject(p, t, s, 9).expect("no-op eject");

    assert!(migrator.index_u64().is_empty());
    assert!(migrator.index_f64().is_empty());
    assert_eq!(migrator.ledger().usage(p), 0);
}

#[test]
fn test_strict_eject_sweeps_strays_beside_live_rows() {
    let mut migrator = Migrator::new(StoreConfig::default().with_require_primary(false));
    let (t, s, p) = (name("t"), name("s"), name("p"));

    migrator.inject(t, s, p, 1, b"kept").expect("inject");
    migrator.idx_u64(t, s, p, 1, 7).expect("idx");
    migrator.idx_u64(t, s, p, 9, 7).expect("stray");
    migrator.idx_u128(t, s, p, 9, 7).expect("stray");

    migrator.eject(p, t, s, 9).expect("strays make the identity present");

    assert!(
        migrator
            .index_entries(&Identity::new(t, s, 9))
            .expect("entries")
            .is_empty()
    );
    assert_eq!(migrator.index_u64().find(t, s, &7).expect("query"), vec![1]);
    assert!(migrator.index_u128().is_empty());
    assert!(migrator.find(t, s, 1).expect("find").is_some());

    let err = migrator.eject(p, t, s, 9).expect_err("nothing left");
    assert_eq!(err, MigratorError::NotFound(Identity::new(t, s, 9)));
}

#[test]
fn test_reinject_after_eject_starts_clean() {
    let mut migrator = Migrator::new(StoreConfig::default());
    let (t, s, p) = (name("t"), name("s"), name("p"));

    migrator.inject(t, s, p, 1, b"first").expect("inject");
    migrator.idx_u64(t, s, p, 1, 5).expect("idx");
    migrator.eject(p, t, s, 1).expect("eject");
    migrator.inject(t, s, p, 1, b"second").expect("reinject");

    let identity = Identity::new(t, s, 1);
    assert!(migrator.index_entries(&identity).expect("entries").is_empty());
    assert_eq!(
        migrator.get(&identity).expect("get").expect("present").data,
        b"second".to_vec()
    );
}
