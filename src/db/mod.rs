pub mod admin;
pub mod codec;
pub mod models;
pub mod pages;
pub mod posts;
pub mod tables;
pub mod users;

use std::path::Path;
use std::sync::Arc;

use redb::{ReadTransaction, WriteTransaction};

use crate::db::tables::Keyspace;

/// Coarse classification of a [`DbError`], enough for a caller to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Consistency,
    Engine,
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("Storage engine error: {0}")]
    Engine(#[from] redb::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound(_) => ErrorKind::NotFound,
            DbError::Validation(_) => ErrorKind::Validation,
            DbError::Consistency(_) => ErrorKind::Consistency,
            DbError::Engine(_) | DbError::Codec(_) => ErrorKind::Engine,
        }
    }
}

macro_rules! engine_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for DbError {
                fn from(e: $source) -> Self {
                    DbError::Engine(e.into())
                }
            }
        )*
    };
}

engine_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type DbResult<T> = Result<T, DbError>;

/// Handle to the single-file store. Cheap to clone; all clones share one file.
#[derive(Clone)]
pub struct Database {
    inner: Arc<redb::Database>,
}

impl Database {
    /// Open (or create) the store file and make sure every keyspace exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DbError::Engine(redb::Error::Io(e)))?;
        }

        let db = redb::Database::create(path)?;
        let database = Self {
            inner: Arc::new(db),
        };

        database.write(|txn| {
            for keyspace in Keyspace::ALL {
                tables::create(txn, keyspace)?;
            }
            txn.open_table(tables::SEQUENCES)?;
            Ok(())
        })?;

        tracing::info!("Store opened at {}", path.display());
        Ok(database)
    }

    /// Run `f` inside one write transaction. Commits on `Ok`, aborts on `Err`.
    ///
    /// The store serializes writers, so everything `f` touches (across any
    /// number of keyspaces) becomes visible atomically or not at all.
    pub fn write<T>(&self, f: impl FnOnce(&WriteTransaction) -> DbResult<T>) -> DbResult<T> {
        let txn = self.inner.begin_write()?;
        match f(&txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::error!("Failed to roll back transaction after '{}': {}", e, abort_err);
                }
                Err(e)
            }
        }
    }

    /// Run `f` against a point-in-time snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&ReadTransaction) -> DbResult<T>) -> DbResult<T> {
        let txn = self.inner.begin_read()?;
        f(&txn)
    }
}
