use crate::params::ParameterSet;
use crate::scheme::SigningKey;
use crate::utils::bytes_to_u64;
use crate::{Error, Result};
use std::fmt::Display;
use std::path::Path;
use zeroize::Zeroize;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "in-disk")]
pub mod in_disk;
#[cfg(feature = "in-memory")]
pub mod in_memory;

/// Persistent home of signing keys. A signing key must be committed after every signature and
/// before the signature is released, so that a crash can never bring back an index that was
/// already used.
pub trait KeyStore {
    /// Open or create the key store, using the given `path`.
    fn open<P>(path: P) -> Result<Self>
    where
        Self: Sized,
        P: AsRef<Path> + Send;

    /// Store the current state of `key` under `key_id`.
    ///
    /// Throws [`Error::StaleState`] if the stored key is already further along than `key`;
    /// committing the same index again is allowed.
    fn commit<S>(&self, key_id: S, key: &SigningKey) -> Result<()>
    where
        S: AsRef<str> + Display + Send;

    /// Load and check the key stored under `key_id`.
    fn load<S>(&self, key_id: S) -> Result<SigningKey>
    where
        S: AsRef<str> + Display + Send;

    /// Check if a key is stored under `key_id`.
    fn contains<S>(&self, key_id: S) -> Result<bool>
    where
        S: AsRef<str> + Display + Send;
}

/// A signing key as it is kept by a store: its parameter set, its index in the clear for the
/// rollback check, and its serialized state.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub(crate) struct StoredKey {
    params: ParameterSet,
    index: u64,
    state: Vec<u8>,
}

impl Drop for StoredKey {
    fn drop(&mut self) {
        self.state.zeroize();
    }
}

impl StoredKey {
    pub(crate) fn from_key(key: &SigningKey) -> Result<Self> {
        Ok(Self {
            params: *key.params(),
            index: key.index(),
            state: key.to_bytes()?,
        })
    }

    pub(crate) fn to_key(&self) -> Result<SigningKey> {
        let key = SigningKey::from_bytes(&self.params, &self.state)?;
        let embedded = bytes_to_u64(&self.state[..self.params.index_bytes]);
        if key.index() != self.index || embedded != self.index {
            return Err(Error::StateCorruption(format!(
                "stored index {} disagrees with the key state",
                self.index
            )));
        }
        Ok(key)
    }

    /// Refuses to replace `self` with a record of a lower index.
    pub(crate) fn check_successor<S: Display>(&self, key_id: S, next: &StoredKey) -> Result<()> {
        if next.index < self.index {
            return Err(Error::StaleState(key_id.to_string(), self.index, next.index));
        }
        Ok(())
    }
}
