//! Test that handles are revoked by any change to their partition.

use crate::testing::{name, new_test_migrator};

#[test]
fn test_handle_survives_reads_only() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("accounts"), name("alice"), name("bob"));

    migrator.inject(t, s, p, 1, b"one").expect("inject");
    let handle = migrator.find(t, s, 1).expect("find").expect("present");

    // Reads and changes elsewhere leave the handle valid.
    migrator.get(&handle.identity()).expect("get");
    migrator.inject(t, name("carol"), p, 1, b"other").expect("inject");
    assert!(migrator.read(&handle).expect("read").is_some());

    migrator.inject(t, s, p, 2, b"two").expect("inject");
    assert!(migrator.read(&handle).expect("read").is_none());

    let fresh = migrator.find(t, s, 1).expect("find").expect("present");
    assert_eq!(
        migrator.read(&fresh).expect("read").expect("live").data,
        b"one".to_vec()
    );
}

#[test]
fn test_handle_revoked_by_eject_of_sibling() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("accounts"), name("alice"), name("bob"));

    migrator.inject(t, s, p, 1, b"one").expect("inject");
    migrator.inject(t, s, p, 2, b"two").expect("inject");
    let handle = migrator.find(t, s, 1).expect("find").expect("present");

    migrator.eject(p, t, s, 2).expect("eject");
    assert!(migrator.read(&handle).expect("read").is_none());
}
