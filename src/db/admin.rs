// Maintenance operations. These run from a one-shot administrative entry point,
// never while requests are being served.
use redb::{ReadableTable, ReadableTableMetadata};

use crate::db::codec;
use crate::db::models::{User, UserRight};
use crate::db::tables::{self, Keyspace, USERS};
use crate::db::users::update_user;
use crate::db::{Database, DbResult};

impl Database {
    pub fn set_user_privilege(&self, user_id: &str, right: UserRight) -> DbResult<()> {
        self.write(|txn| update_user(txn, user_id, |user| user.right = right))?;
        tracing::info!("User {} now has right '{}'", user_id, right);
        Ok(())
    }

    /// Every user record in key order. Records that fail to decode are logged
    /// and reported as `None`.
    pub fn list_all_users(&self) -> DbResult<Vec<(String, Option<User>)>> {
        self.read(|txn| {
            let users = txn.open_table(USERS)?;
            let mut listed = Vec::new();
            for entry in users.iter()? {
                let (key, value) = entry?;
                let user_id = key.value().to_string();
                match codec::decode_user(value.value()) {
                    Ok(user) => listed.push((user_id, Some(user))),
                    Err(e) => {
                        tracing::warn!("Skipping damaged record of user {}: {}", user_id, e);
                        listed.push((user_id, None));
                    }
                }
            }
            Ok(listed)
        })
    }

    pub fn count_users(&self) -> DbResult<u64> {
        self.read(|txn| {
            let users = txn.open_table(USERS)?;
            Ok(users.len()?)
        })
    }

    /// Drop every record in `keyspace`. The keyspace itself is recreated in the
    /// same transaction, so it is never observed missing.
    pub fn wipe_keyspace(&self, keyspace: Keyspace) -> DbResult<()> {
        self.write(|txn| {
            tables::delete(txn, keyspace)?;
            tables::create(txn, keyspace)
        })?;
        tracing::info!("Wiped keyspace {}", keyspace);
        Ok(())
    }
}
