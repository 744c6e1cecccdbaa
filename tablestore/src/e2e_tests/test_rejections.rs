//! Test that rejected actions leave the store untouched.

use crate::config::StoreConfig;
use crate::migrator::{Action, Migrator, MigratorError};
use crate::storage::MAX_RECORD_SIZE;
use crate::testing::{name, new_test_migrator};
use crate::types::{ExtendedFloat, IndexValue, KeyError};

#[test]
fn test_duplicate_inject_keeps_original() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("t"), name("s"), name("p"));

    migrator.inject(t, s, p, 1, b"original").expect("inject");
    let before = migrator.ledger().clone();

    let err = migrator
        .inject(t, s, name("q"), 1, b"replacement")
        .expect_err("duplicate");
    assert!(matches!(err, MigratorError::DuplicateKey(_)));
    assert_eq!(migrator.ledger(), &before);
    assert_eq!(
        migrator
            .get(&crate::types::Identity::new(t, s, 1))
            .expect("get")
            .expect("present")
            .data,
        b"original".to_vec()
    );
}

#[test]
fn test_record_size_limit() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("t"), name("s"), name("p"));

    migrator
        .inject(t, s, p, 1, &vec![1; MAX_RECORD_SIZE])
        .expect("largest record");
    let err = migrator
        .inject(t, s, p, 2, &vec![1; MAX_RECORD_SIZE + 1])
        .expect_err("too large");
    assert_eq!(
        err,
        MigratorError::TooLarge {
            size: MAX_RECORD_SIZE + 1,
            max: MAX_RECORD_SIZE
        }
    );

    let mut small = Migrator::new(StoreConfig::default().with_max_record_size(16));
    assert_eq!(
        small.apply(&Action::Inject {
            table: t,
            scope: s,
            payer: p,
            id: 1,
            data: vec![0; 17],
        }),
        -2
    );
}

#[test]
fn test_nan_keys_rejected() {
    let mut migrator = new_test_migrator();
    let (t, s, p) = (name("t"), name("s"), name("p"));
    migrator.inject(t, s, p, 1, b"x").expect("inject");

    assert_eq!(
        migrator.idx_f64(t, s, p, 1, f64::NAN),
        Err(MigratorError::InvalidKey(KeyError::NotANumber))
    );
    assert_eq!(
        migrator.apply(&Action::index(t, s, p, 1, IndexValue::F80(ExtendedFloat::NAN))),
        -4
    );
    assert!(migrator.index_f64().is_empty());
    assert!(migrator.index_f80().is_empty());
}
