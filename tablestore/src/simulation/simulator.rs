//! Main simulator harness for deterministic simulation testing.
//!
//! This module ties the action generator, the reference model and the
//! invariant checker together around a fresh `Migrator`.

use std::collections::BTreeSet;

use super::generator::{ActionGenerator, GeneratorConfig};
use super::invariants::{InvariantChecker, InvariantViolation, ReferenceModel};
use crate::config::StoreConfig;
use crate::migrator::{Migrator, STATUS_OK};
use crate::types::Identity;

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Store configuration under test.
    pub store: StoreConfig,
    /// Action generation configuration.
    pub generator: GeneratorConfig,
    /// Run the full state check every this many actions. Zero checks only
    /// at the end of the run.
    pub check_interval: usize,
}

impl SimulatorConfig {
    /// Create a new simulator config with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            store: StoreConfig::default(),
            generator: GeneratorConfig::default(),
            check_interval: 100,
        }
    }

    #[must_use]
    pub fn with_store_config(mut self, config: StoreConfig) -> Self {
        self.store = config;
        self
    }

    #[must_use]
    pub const fn with_generator_config(mut self, config: GeneratorConfig) -> Self {
        self.generator = config;
        self
    }

    /// Set the malformed action rate.
    #[must_use]
    pub const fn with_malformed_rate(mut self, rate: f64) -> Self {
        self.generator.malformed_rate = rate;
        self
    }

    #[must_use]
    pub const fn with_check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    /// Number of actions applied.
    pub actions_processed: u64,
    /// Number of actions the store accepted.
    pub successful_operations: u64,
    /// Number of actions the store rejected.
    pub failed_operations: u64,
    /// Invariant violations detected.
    pub invariant_violations: Vec<InvariantViolation>,
    /// Whether the simulation ran to the end.
    pub completed_successfully: bool,
    /// Error message if the simulation stopped early.
    pub error: Option<String>,
}

impl SimulationResult {
    /// Check if the simulation passed (no invariant violations).
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::is_empty() is not const-stable
    pub fn passed(&self) -> bool {
        self.completed_successfully && self.invariant_violations.is_empty()
    }
}

/// The main simulator harness.
///
/// Every generated action is applied to the store and its status compared
/// with the model's prediction. The full state is compared periodically and
/// once more at the end.
pub struct Simulator {
    config: SimulatorConfig,
    generator: ActionGenerator,
    model: ReferenceModel,
    checker: InvariantChecker,
    migrator: Migrator,
    touched: BTreeSet<Identity>,
    actions_processed: u64,
    successful_operations: u64,
    failed_operations: u64,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            generator: ActionGenerator::with_config(config.seed, config.generator),
            model: ReferenceModel::new(config.store.clone()),
            checker: InvariantChecker::new(),
            migrator: Migrator::new(config.store.clone()),
            touched: BTreeSet::new(),
            config,
            actions_processed: 0,
            successful_operations: 0,
            failed_operations: 0,
        }
    }

    /// Run the simulation for a given number of actions.
    pub fn run(&mut self, action_count: usize) -> SimulationResult {
        tracing::info!(
            "simulation seed {} running {action_count} actions",
            self.config.seed
        );

        for operation_index in 0..action_count {
            let action = self.generator.next_action();
            self.actions_processed += 1;

            let expected = self.model.predict(&action);
            let actual = self.migrator.apply(&action);
            self.checker
                .check_status(&action, expected, actual, operation_index);

            if actual == STATUS_OK {
                self.model.record(&action);
                self.successful_operations += 1;
            } else {
                self.failed_operations += 1;
            }
            self.touched.insert(action.identity());

            let interval = self.config.check_interval;
            if interval > 0 && (operation_index + 1) % interval == 0 {
                if let Err(e) = self.check_state(operation_index) {
                    return self.result(Some(e));
                }
            }
        }

        if let Err(e) = self.check_state(action_count) {
            return self.result(Some(e));
        }
        self.result(None)
    }

    fn check_state(&mut self, operation_index: usize) -> Result<(), String> {
        self.checker
            .check_state(&self.migrator, &self.model, &self.touched, operation_index)
            .map_err(|e| format!("state check failed: {e}"))
    }

    fn result(&self, error: Option<String>) -> SimulationResult {
        let result = SimulationResult {
            seed: self.config.seed,
            actions_processed: self.actions_processed,
            successful_operations: self.successful_operations,
            failed_operations: self.failed_operations,
            invariant_violations: self.checker.violations().to_vec(),
            completed_successfully: error.is_none(),
            error,
        };
        tracing::info!(
            "simulation seed {} finished: {} accepted, {} rejected, {} violations",
            result.seed,
            result.successful_operations,
            result.failed_operations,
            result.invariant_violations.len()
        );
        result
    }

    /// The store under test.
    #[must_use]
    pub const fn migrator(&self) -> &Migrator {
        &self.migrator
    }

    #[must_use]
    pub const fn checker(&self) -> &InvariantChecker {
        &self.checker
    }
}
