//! Test exporting a store to a snapshot file and importing it elsewhere.

use crate::consistency;
use crate::migrator::Migrator;
use crate::simulation::{Simulator, SimulatorConfig};
use crate::snapshot;
use crate::testing::{name, new_test_migrator};
use crate::types::{ExtendedFloat, Identity};

fn assert_same_contents(a: &Migrator, b: &Migrator) {
    let rows_a = a.primary().rows().expect("rows");
    let rows_b = b.primary().rows().expect("rows");
    assert_eq!(rows_a, rows_b);

    for (identity, _) in &rows_a {
        let entries_a: Vec<_> = a
            .index_entries(identity)
            .expect("entries")
            .into_iter()
            .map(|e| (e.value.to_encoded(), e.payer))
            .collect();
        let entries_b: Vec<_> = b
            .index_entries(identity)
            .expect("entries")
            .into_iter()
            .map(|e| (e.value.to_encoded(), e.payer))
            .collect();
        assert_eq!(entries_a, entries_b, "{identity}");
    }
    assert_eq!(a.ledger(), b.ledger());
}

#[test]
fn test_snapshot_file_roundtrip() {
    let mut source = new_test_migrator();
    let (t, s, p) = (name("accounts"), name("alice"), name("bob"));
    for id in 0..50 {
        source.inject(t, s, p, id, &[u8::try_from(id).expect("small id"); 20]).expect("inject");
        source.idx_u64(t, s, name("carol"), id, id % 7).expect("idx64");
        source
            .idx_f80(t, s, p, id, ExtendedFloat::from_f64(-1.0))
            .expect("idx_long_double");
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.snap");
    let exported = snapshot::export_to_path(&source, &path).expect("export");
    assert_eq!(exported.rows, 50);
    assert_eq!(exported.entries, 100);

    let mut restored = new_test_migrator();
    let imported = snapshot::import_from_path(&path, &mut restored).expect("import");
    assert_eq!(imported, exported);

    assert_same_contents(&source, &restored);
    assert_eq!(
        restored
            .index_u64()
            .find(t, s, &3)
            .expect("query"),
        source.index_u64().find(t, s, &3).expect("query")
    );
    assert_eq!(
        restored
            .index_f80()
            .find(t, s, &ExtendedFloat::from_f64(-1.0))
            .expect("query")
            .len(),
        50
    );
    assert!(consistency::check(&restored).expect("check").is_clean());
}

#[test]
fn test_snapshot_of_simulated_store() {
    let mut simulator = Simulator::new(SimulatorConfig::new(4242).with_malformed_rate(0.1));
    let result = simulator.run(2_000);
    assert!(result.passed(), "{:?}", result.invariant_violations);

    let mut bytes = Vec::new();
    snapshot::export(simulator.migrator(), &mut bytes).expect("export");

    let mut restored = new_test_migrator();
    snapshot::import(bytes.as_slice(), &mut restored).expect("import");

    assert_same_contents(simulator.migrator(), &restored);
    assert!(
        restored
            .get(&Identity::new(name("accounts"), name("alice"), u64::MAX))
            .expect("get")
            .is_none()
    );
}
