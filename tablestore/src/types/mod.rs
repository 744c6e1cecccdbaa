//! Addressing and key types shared by every storage structure.

mod identity;
mod keys;
mod name;

pub use identity::{Identity, Partition};
pub use keys::{
    Digest256, ExtendedFloat, IndexKind, IndexValue, KeyError, MAX_KEY_WIDTH, SecondaryKey,
};
pub use name::{MAX_NAME_LEN, Name, NameError};
