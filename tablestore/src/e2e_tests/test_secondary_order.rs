//! Test key ordering and duplicate-key behavior of the secondary indexes.

use crate::testing::{name, new_test_migrator};
use crate::types::{Digest256, ExtendedFloat};

#[test]
fn test_duplicate_keys_keep_insertion_order() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("stat"), name("bob"), name("carol"));

    for id in [5, 3, 9, 1] {
        migrator.inject(t, s, p, id, b"x").expect("inject");
        migrator.idx_u128(t, s, p, id, 77).expect("idx128");
    }

    assert_eq!(
        migrator.index_u128().find(t, s, &77).expect("query"),
        vec![5, 3, 9, 1]
    );
}

#[test]
fn test_float_keys_scan_in_numeric_order() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("stat"), name("bob"), name("carol"));
    let keys = [2.5, -0.5, f64::INFINITY, -100.0, 0.0, f64::NEG_INFINITY];

    for (id, key) in (0u64..).zip(keys) {
        migrator.inject(t, s, p, id, b"x").expect("inject");
        migrator.idx_f64(t, s, p, id, key).expect("idx_double");
    }

    let scanned: Vec<f64> = migrator
        .index_f64()
        .entries()
        .expect("entries")
        .into_iter()
        .map(|entry| entry.key)
        .collect();
    assert_eq!(
        scanned,
        vec![f64::NEG_INFINITY, -100.0, -0.5, 0.0, 2.5, f64::INFINITY]
    );

    let (key, id) = migrator
        .index_f64()
        .lower_bound(t, s, &0.1)
        .expect("lower_bound")
        .expect("found");
    assert!((key - 2.5).abs() < f64::EPSILON);
    assert_eq!(id, 0);
}

#[test]
fn test_extended_keys_order_like_doubles() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("stat"), name("bob"), name("carol"));

    for (id, key) in (0u64..).zip([1.0, -3.0, 0.5]) {
        migrator.inject(t, s, p, id, b"x").expect("inject");
        migrator
            .idx_f80(t, s, p, id, ExtendedFloat::from_f64(key))
            .expect("idx_long_double");
    }

    let ids: Vec<u64> = migrator
        .index_f80()
        .entries()
        .expect("entries")
        .into_iter()
        .map(|entry| entry.identity.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 0]);
}

#[test]
fn test_digest_keys_compare_high_half_first() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("stat"), name("bob"), name("carol"));
    let low_heavy = Digest256::new(0, u128::MAX);
    let high_heavy = Digest256::new(1, 0);

    migrator.inject(t, s, p, 1, b"x").expect("inject");
    migrator.inject(t, s, p, 2, b"y").expect("inject");
    migrator.idx_digest256(t, s, p, 1, high_heavy).expect("idx256");
    migrator.idx_digest256(t, s, p, 2, low_heavy).expect("idx256");

    let (first, id) = migrator
        .index_digest256()
        .lower_bound(t, s, &Digest256::new(0, 0))
        .expect("lower_bound")
        .expect("found");
    assert_eq!(first, low_heavy);
    assert_eq!(id, 2);
}

#[test]
fn test_lower_bound_stays_in_partition() {
    let mut migrator = new_test_migrator();
    let (t, p) = (name("stat"), name("carol"));

    migrator.inject(t, name("alice"), p, 1, b"x").expect("inject");
    migrator.inject(t, name("bob"), p, 1, b"x").expect("inject");
    migrator.idx_u64(t, name("alice"), p, 1, 10).expect("idx");
    migrator.idx_u64(t, name("bob"), p, 1, 1).expect("idx");

    assert!(
        migrator
            .index_u64()
            .lower_bound(t, name("alice"), &11)
            .expect("lower_bound")
            .is_none()
    );
}
