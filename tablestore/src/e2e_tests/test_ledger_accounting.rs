//! Test payer billing across injects, overwrites, index stores and ejects.

use crate::config::StoreConfig;
use crate::consistency;
use crate::migrator::Migrator;
use crate::storage::{primary_row_cost, secondary_row_cost};
use crate::testing::{name, new_test_migrator};

#[test]
fn test_each_payer_billed_for_own_rows() {
    let mut migrator = new_test_migrator();
    let (t, s) = (name("accounts"), name("alice"));
    let (bob, carol) = (name("bob"), name("carol"));

    migrator.inject(t, s, bob, 1, &[0; 10]).expect("inject");
    migrator.idx_u64(t, s, carol, 1, 1).expect("idx64");
    migrator.idx_digest256(t, s, carol, 1, crate::types::Digest256::new(1, 2)).expect("idx256");

    assert_eq!(migrator.ledger().usage(bob), primary_row_cost(10));
    assert_eq!(
        migrator.ledger().usage(carol),
        secondary_row_cost(8) + secondary_row_cost(32)
    );

    migrator.eject(bob, t, s, 1).expect("eject");
    assert_eq!(migrator.ledger().total(), 0);
}

#[test]
fn test_overwrite_moves_billing() {
    let config = StoreConfig::default().with_allow_overwrite(true);
    let mut migrator = Migrator::new(config);
    let (t, s) = (name("accounts"), name("alice"));
    let (bob, carol) = (name("bob"), name("carol"));

    migrator.inject(t, s, bob, 1, &[0; 10]).expect("inject");
    migrator.inject(t, s, carol, 1, &[0; 3]).expect("overwrite");

    assert_eq!(migrator.ledger().usage(bob), 0);
    assert_eq!(migrator.ledger().usage(carol), primary_row_cost(3));
    assert!(consistency::check(&migrator).expect("check").is_clean());
}
