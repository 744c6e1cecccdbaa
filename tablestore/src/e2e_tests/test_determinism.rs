//! Test that the same sequence of actions produces identical results.

use crate::migrator::{Action, Migrator};
use crate::simulation::ActionGenerator;
use crate::snapshot;
use crate::testing::new_test_migrator;

fn run_sequence(seed: u64) -> (Vec<i32>, Migrator) {
    let mut generator = ActionGenerator::new(seed);
    generator.set_malformed_rate(0.2);
    let mut migrator = new_test_migrator();

    let statuses = (0..1_000)
        .map(|_| {
            let action: Action = generator.next_action();
            migrator.apply(&action)
        })
        .collect();
    (statuses, migrator)
}

#[test]
fn test_deterministic_sequence() {
    let (statuses1, migrator1) = run_sequence(80);
    let (statuses2, migrator2) = run_sequence(80);

    assert_eq!(statuses1, statuses2);

    let mut snapshot1 = Vec::new();
    let mut snapshot2 = Vec::new();
    snapshot::export(&migrator1, &mut snapshot1).expect("export");
    snapshot::export(&migrator2, &mut snapshot2).expect("export");
    assert_eq!(snapshot1, snapshot2);
}

#[test]
fn test_different_seeds_diverge() {
    let (statuses1, _) = run_sequence(1);
    let (statuses2, _) = run_sequence(2);
    assert_ne!(statuses1, statuses2);
}
