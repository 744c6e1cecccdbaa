//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! This module drives the store with:
//! - Reproducible random action sequences, well-formed and malformed
//! - A reference model predicting the status of every action
//! - Periodic comparison of records, secondary entries and ledger usage
//!   against the model, plus the offline consistency check
//!
//! Given the same seed, execution is identical.
//!
//! # Usage
//!
//! ```
//! use tablestore::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345) // seed
//!     .with_malformed_rate(0.1);
//!
//! let mut sim = Simulator::new(config);
//! let result = sim.run(1000); // Run 1000 actions
//!
//! assert!(result.invariant_violations.is_empty());
//! ```

mod generator;
mod invariants;
mod simulator;

pub use generator::{ABSENT_ID_BASE, ActionGenerator, GeneratorConfig, MalformationType};
pub use invariants::{InvariantChecker, InvariantViolation, ReferenceModel};
pub use simulator::{SimulationResult, Simulator, SimulatorConfig};
