use crate::config::StoreConfig;
use crate::migrator::Migrator;
use crate::types::Name;

/// Create an empty store with the default configuration.
pub fn new_test_migrator() -> Migrator {
    Migrator::new(StoreConfig::default())
}

/// Create an empty store that accepts overwrites, stray index entries and
/// ejects of absent records.
pub fn new_lenient_migrator() -> Migrator {
    Migrator::new(
        StoreConfig::default()
            .with_allow_overwrite(true)
            .with_require_primary(false)
            .with_strict_eject(false),
    )
}

/// Parse a name known to be valid.
pub fn name(s: &str) -> Name {
    Name::parse(s).expect("test names are valid")
}
