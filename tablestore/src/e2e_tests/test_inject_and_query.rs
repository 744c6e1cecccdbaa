//! Test the basic inject, index, query, eject cycle.

use crate::migrator::{Action, STATUS_OK};
use crate::testing::{name, new_test_migrator};
use crate::types::{Identity, IndexValue};

#[test]
fn test_inject_index_query_eject() {
    let mut migrator = new_test_migrator();
    let (accounts, alice, bob) = (name("accounts"), name("alice"), name("bob"));

    migrator
        .inject(accounts, alice, bob, 1, &[0x01, 0x02])
        .expect("inject");
    migrator.idx_u64(accounts, alice, bob, 1, 42).expect("idx64");

    assert_eq!(
        migrator
            .index_u64()
            .find(accounts, alice, &42)
            .expect("query"),
        vec![1]
    );

    migrator.eject(alice, accounts, alice, 1).expect("eject");

    assert!(migrator.find(accounts, alice, 1).expect("find").is_none());
    assert!(
        migrator
            .index_u64()
            .find(accounts, alice, &42)
            .expect("query")
            .is_empty()
    );
    assert!(
        migrator
            .index_entries(&Identity::new(accounts, alice, 1))
            .expect("entries")
            .is_empty()
    );
}

#[test]
fn test_same_cycle_through_apply() {
    let mut migrator = new_test_migrator();
    let (accounts, alice, bob) = (name("accounts"), name("alice"), name("bob"));

    let actions = [
        Action::Inject {
            table: accounts,
            scope: alice,
            payer: bob,
            id: 1,
            data: vec![0x01, 0x02],
        },
        Action::index(accounts, alice, bob, 1, IndexValue::U64(42)),
        Action::Eject {
            account: alice,
            table: accounts,
            scope: alice,
            id: 1,
        },
    ];

    for action in &actions {
        assert_eq!(migrator.apply(action), STATUS_OK, "{action}");
    }
    assert!(migrator.primary().is_empty());
    assert!(migrator.index_u64().is_empty());
    assert_eq!(migrator.ledger().total(), 0);
}

#[test]
fn test_partitions_are_isolated() {
    let mut migrator = new_test_migrator();
    let (t, p) = (name("accounts"), name("bob"));

    migrator.inject(t, name("alice"), p, 1, b"a").expect("inject");
    migrator.inject(t, name("carol"), p, 1, b"c").expect("inject");
    migrator.idx_u64(t, name("alice"), p, 1, 7).expect("idx");
    migrator.idx_u64(t, name("carol"), p, 1, 7).expect("idx");

    migrator.eject(p, t, name("alice"), 1).expect("eject");

    assert_eq!(
        migrator
            .index_u64()
            .find(t, name("carol"), &7)
            .expect("query"),
        vec![1]
    );
    let record = migrator
        .get(&Identity::new(t, name("carol"), 1))
        .expect("get")
        .expect("present");
    assert_eq!(record.data, b"c".to_vec());
}
