use crate::db::{KeyStore, StoredKey};
use crate::error::Error;
use crate::scheme::SigningKey;
use crate::Result;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::fmt::Display;
use std::path::Path;

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Self::DbInternalError(format!("sled error: {}", e))
    }
}

impl From<TransactionError<Error>> for Error {
    fn from(e: TransactionError<Error>) -> Self {
        match e {
            TransactionError::Storage(err) => err.into(),
            TransactionError::Abort(err) => err,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Self::DbInternalError(format!("bincode error: {}", e))
    }
}

/// Keeps signing keys in a `sled` tree. Every commit is flushed to disk before it returns.
pub struct InDiskKeyStore {
    _db: sled::Db,
    tree: sled::Tree,
}

impl KeyStore for InDiskKeyStore {
    fn open<P>(path: P) -> Result<Self>
    where
        Self: Sized,
        P: AsRef<Path> + Send,
    {
        let db = sled::open(path.as_ref().join("keys"))?;
        let tree = db.open_tree("signing_keys")?;
        Ok(Self { _db: db, tree })
    }

    fn commit<S>(&self, key_id: S, key: &SigningKey) -> Result<()>
    where
        S: AsRef<str> + Display + Send,
    {
        let record = StoredKey::from_key(key)?;
        let serialized = bincode::serialize(&record)?;
        let id = key_id.as_ref().as_bytes();

        self.tree
            .transaction(|tree| -> std::result::Result<(), ConflictableTransactionError<Error>> {
                if let Some(val) = tree.get(id)? {
                    let stored: StoredKey = bincode::deserialize(&val)
                        .map_err(|e| ConflictableTransactionError::Abort(e.into()))?;
                    stored
                        .check_successor(&key_id, &record)
                        .map_err(ConflictableTransactionError::Abort)?;
                }
                tree.insert(id, serialized.as_slice())?;
                Ok(())
            })?;
        self.tree.flush()?;
        Ok(())
    }

    fn load<S>(&self, key_id: S) -> Result<SigningKey>
    where
        S: AsRef<str> + Display + Send,
    {
        match self.tree.get(key_id.as_ref().as_bytes())? {
            Some(val) => {
                let stored: StoredKey = bincode::deserialize(&val)?;
                stored.to_key()
            },
            None => Err(Error::KeyNotFound(key_id.to_string())),
        }
    }

    fn contains<S>(&self, key_id: S) -> Result<bool>
    where
        S: AsRef<str> + Display + Send,
    {
        Ok(self.tree.contains_key(key_id.as_ref().as_bytes())?)
    }
}
