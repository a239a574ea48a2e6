mod bds;
mod db;
mod error;
mod hash;
mod tree;
mod utils;

pub mod adrs;
pub mod chain;
pub mod cipher;
pub mod params;
pub mod scheme;
pub mod wots;

pub use crate::db::KeyStore;
pub use crate::error::{Error, Result, VerificationError};
pub use crate::params::{ChainKind, HashFunction, ParameterSet};
pub use crate::scheme::{LayerSignature, PublicKey, Signature, SigningKey, Xmss};

#[cfg(feature = "in-disk")]
pub use crate::db::in_disk::InDiskKeyStore;
#[cfg(feature = "in-memory")]
pub use crate::db::in_memory::InMemoryKeyStore;
