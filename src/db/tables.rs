use std::fmt;
use std::str::FromStr;

use redb::{ReadableTable, TableDefinition, WriteTransaction};

use crate::db::{DbError, DbResult};

/// Wiki pages: title -> raw body bytes
pub const PAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("pages");

/// Users: user_id (SHA-256 hex) -> User (JSON)
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Posts: big-endian u64 post id -> Post (JSON)
pub const POSTS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("posts");

/// Per-keyspace id counters: keyspace name -> last issued value
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// The keyspaces that hold application records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyspace {
    Pages,
    Users,
    Posts,
}

impl Keyspace {
    pub const ALL: [Keyspace; 3] = [Keyspace::Pages, Keyspace::Users, Keyspace::Posts];

    pub fn name(&self) -> &'static str {
        match self {
            Keyspace::Pages => "pages",
            Keyspace::Users => "users",
            Keyspace::Posts => "posts",
        }
    }
}

impl fmt::Display for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Keyspace {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Keyspace::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DbError::NotFound(format!("keyspace '{}'", s)))
    }
}

/// Encode a post id so byte order equals numeric order.
pub fn post_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

pub(crate) fn create(txn: &WriteTransaction, keyspace: Keyspace) -> DbResult<()> {
    match keyspace {
        Keyspace::Pages => {
            txn.open_table(PAGES)?;
        }
        Keyspace::Users => {
            txn.open_table(USERS)?;
        }
        Keyspace::Posts => {
            txn.open_table(POSTS)?;
        }
    }
    Ok(())
}

pub(crate) fn delete(txn: &WriteTransaction, keyspace: Keyspace) -> DbResult<bool> {
    let existed = match keyspace {
        Keyspace::Pages => txn.delete_table(PAGES)?,
        Keyspace::Users => txn.delete_table(USERS)?,
        Keyspace::Posts => txn.delete_table(POSTS)?,
    };
    Ok(existed)
}

/// Mint the next id for `keyspace`. The first value handed out is 1.
///
/// The counter lives in the caller's transaction, so an aborted write
/// never consumes a value.
pub(crate) fn next_sequence(txn: &WriteTransaction, keyspace: Keyspace) -> DbResult<u64> {
    let mut sequences = txn.open_table(SEQUENCES)?;
    let current = sequences.get(keyspace.name())?.map(|v| v.value()).unwrap_or(0);
    let next = current.checked_add(1).ok_or_else(|| {
        DbError::Consistency(format!("sequence for {} is exhausted", keyspace))
    })?;
    sequences.insert(keyspace.name(), next)?;
    Ok(next)
}
