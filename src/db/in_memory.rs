use crate::db::{KeyStore, StoredKey};
use crate::scheme::SigningKey;
use crate::Result;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

impl<T> From<PoisonError<T>> for crate::error::Error {
    fn from(err: PoisonError<T>) -> Self {
        Self::DbInternalError(format!("Lock error: {}", err))
    }
}

/// Keeps signing keys for the lifetime of the process only. Useful for tests and for callers
/// that persist keys by other means.
#[derive(Default, Clone)]
pub struct InMemoryKeyStore {
    keys: Arc<Mutex<HashMap<String, StoredKey>>>,
}

impl KeyStore for InMemoryKeyStore {
    fn open<P>(_: P) -> Result<Self>
    where
        Self: Sized,
        P: AsRef<Path> + Send,
    {
        Ok(Self::default())
    }

    fn commit<S>(&self, key_id: S, key: &SigningKey) -> Result<()>
    where
        S: AsRef<str> + Display + Send,
    {
        let record = StoredKey::from_key(key)?;
        let mut keys = self.keys.lock()?;
        if let Some(stored) = keys.get(key_id.as_ref()) {
            stored.check_successor(&key_id, &record)?;
        }
        keys.insert(key_id.as_ref().to_owned(), record);
        Ok(())
    }

    fn load<S>(&self, key_id: S) -> Result<SigningKey>
    where
        S: AsRef<str> + Display + Send,
    {
        let keys = self.keys.lock()?;
        let stored = keys
            .get(key_id.as_ref())
            .ok_or_else(|| crate::error::Error::KeyNotFound(key_id.to_string()))?;
        stored.to_key()
    }

    fn contains<S>(&self, key_id: S) -> Result<bool>
    where
        S: AsRef<str> + Display + Send,
    {
        let keys = self.keys.lock()?;
        Ok(keys.contains_key(key_id.as_ref()))
    }
}
