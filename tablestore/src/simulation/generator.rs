//! Action generator for deterministic simulation testing.
//!
//! This module generates random but reproducible `Action` sequences over
//! small pools of tables, scopes, payers and ids, so that duplicate injects,
//! shared secondary keys and cascading ejects happen often.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::migrator::Action;
use crate::types::{Digest256, ExtendedFloat, IndexKind, IndexValue, Name};

/// Ids at or above this value are never injected by the generator.
pub const ABSENT_ID_BASE: u64 = 1 << 32;

const TABLES: [&str; 3] = ["accounts", "stat", "votes"];
const SCOPES: [&str; 3] = ["alice", "bob", "eosio"];
const PAYERS: [&str; 4] = ["alice", "bob", "carol", "dave"];

/// Configuration for action generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    /// Probability of generating a malformed action (0.0 - 1.0).
    pub malformed_rate: f64,
    /// Probability that a well-formed action is an inject.
    pub inject_rate: f64,
    /// Probability that a well-formed action is an eject.
    pub eject_rate: f64,
    /// Number of distinct ids per partition.
    pub id_pool_size: u64,
    /// Maximum length of generated record data.
    pub max_data_length: usize,
    /// Number of distinct secondary key values. Small ranges force duplicates.
    pub key_range: u32,
    /// Size used for deliberately oversized records.
    pub oversized_length: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            malformed_rate: 0.0,
            inject_rate: 0.4,
            eject_rate: 0.15,
            id_pool_size: 24,
            max_data_length: 64,
            key_range: 16,
            oversized_length: crate::storage::MAX_RECORD_SIZE + 1,
        }
    }
}

/// Types of malformations that can be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformationType {
    /// Double key that is NaN.
    NanDouble,
    /// Extended-precision key that is NaN.
    NanExtended,
    /// Record larger than the maximum record size.
    OversizedRecord,
    /// Eject of an id that was never injected.
    EjectAbsent,
    /// Secondary key for an id that was never injected.
    IndexAbsent,
}

impl MalformationType {
    /// All malformation types.
    pub const ALL: [Self; 5] = [
        Self::NanDouble,
        Self::NanExtended,
        Self::OversizedRecord,
        Self::EjectAbsent,
        Self::IndexAbsent,
    ];
}

/// Generator for random `Action` instances.
///
/// The same seed always yields the same sequence.
pub struct ActionGenerator {
    rng: StdRng,
    config: GeneratorConfig,
    tables: Vec<Name>,
    scopes: Vec<Name>,
    payers: Vec<Name>,
}

impl ActionGenerator {
    /// Create a new generator with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, GeneratorConfig::default())
    }

    /// Create a new generator with custom configuration.
    #[must_use]
    pub fn with_config(seed: u64, config: GeneratorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
            tables: name_pool(&TABLES),
            scopes: name_pool(&SCOPES),
            payers: name_pool(&PAYERS),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub const fn set_malformed_rate(&mut self, rate: f64) {
        self.config.malformed_rate = rate;
    }

    /// Generate the next action.
    pub fn next_action(&mut self) -> Action {
        if self.rng.random::<f64>() < self.config.malformed_rate {
            let malformation =
                MalformationType::ALL[self.rng.random_range(0..MalformationType::ALL.len())];
            self.malformed_action(malformation)
        } else {
            self.wellformed_action()
        }
    }

    /// Generate a well-formed action over the id pool.
    ///
    /// Well-formed actions can still be rejected, for example an inject of
    /// an identity that already holds a record.
    pub fn wellformed_action(&mut self) -> Action {
        let roll = self.rng.random::<f64>();
        let (table, scope, id) = self.pooled_identity();

        if roll < self.config.inject_rate {
            let data = self.random_data();
            Action::Inject {
                table,
                scope,
                payer: self.random_payer(),
                id,
                data,
            }
        } else if roll < self.config.inject_rate + self.config.eject_rate {
            Action::Eject {
                account: self.random_payer(),
                table,
                scope,
                id,
            }
        } else {
            let kind = IndexKind::ALL[self.rng.random_range(0..IndexKind::ALL.len())];
            let key = self.random_key(kind);
            Action::index(table, scope, self.random_payer(), id, key)
        }
    }

    /// Generate an action with a specific malformation.
    pub fn malformed_action(&mut self, malformation: MalformationType) -> Action {
        let (table, scope, id) = self.pooled_identity();
        let payer = self.random_payer();

        match malformation {
            MalformationType::NanDouble => {
                Action::index(table, scope, payer, id, IndexValue::F64(f64::NAN))
            }
            MalformationType::NanExtended => {
                Action::index(table, scope, payer, id, IndexValue::F80(ExtendedFloat::NAN))
            }
            MalformationType::OversizedRecord => Action::Inject {
                table,
                scope,
                payer,
                id,
                data: vec![0xAB; self.config.oversized_length],
            },
            MalformationType::EjectAbsent => Action::Eject {
                account: payer,
                table,
                scope,
                id: self.absent_id(),
            },
            MalformationType::IndexAbsent => {
                let kind = IndexKind::ALL[self.rng.random_range(0..IndexKind::ALL.len())];
                let key = self.random_key(kind);
                Action::index(table, scope, payer, self.absent_id(), key)
            }
        }
    }

    fn pooled_identity(&mut self) -> (Name, Name, u64) {
        let table = self.tables[self.rng.random_range(0..self.tables.len())];
        let scope = self.scopes[self.rng.random_range(0..self.scopes.len())];
        let id = self.rng.random_range(0..self.config.id_pool_size.max(1));
        (table, scope, id)
    }

    fn absent_id(&mut self) -> u64 {
        ABSENT_ID_BASE + self.rng.random_range(0..1024)
    }

    fn random_payer(&mut self) -> Name {
        self.payers[self.rng.random_range(0..self.payers.len())]
    }

    fn random_data(&mut self) -> Vec<u8> {
        let len = self.rng.random_range(0..=self.config.max_data_length);
        let mut data = vec![0u8; len];
        self.rng.fill(data.as_mut_slice());
        data
    }

    /// A non-NaN key of the given kind drawn from `key_range` values.
    pub fn random_key(&mut self, kind: IndexKind) -> IndexValue {
        let n = self.rng.random_range(0..self.config.key_range.max(1));
        // Signed spread so float keys cover both sides of zero.
        let signed = f64::from(n) - f64::from(self.config.key_range / 2);

        match kind {
            IndexKind::U64 => IndexValue::U64(u64::from(n)),
            IndexKind::U128 => IndexValue::U128((u128::from(n) << 64) | u128::from(n)),
            IndexKind::Digest256 => IndexValue::Digest256(Digest256::new(u128::from(n), !0)),
            IndexKind::F64 => match self.rng.random_range(0..16) {
                0 => IndexValue::F64(f64::INFINITY),
                1 => IndexValue::F64(-0.0),
                _ => IndexValue::F64(signed / 4.0),
            },
            IndexKind::F80 => IndexValue::F80(ExtendedFloat::from_f64(signed / 4.0)),
        }
    }
}

fn name_pool(names: &[&str]) -> Vec<Name> {
    names.iter().filter_map(|s| Name::parse(s).ok()).collect()
}
