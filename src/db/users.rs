use redb::{ReadableTable, Table, WriteTransaction};

use crate::db::codec;
use crate::db::models::{User, UserIdentity};
use crate::db::tables::USERS;
use crate::db::{Database, DbError, DbResult};

pub(crate) fn load_user<T>(users: &T, user_id: &str) -> DbResult<Option<User>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match users.get(user_id)? {
        Some(raw) => Ok(Some(codec::decode_user(raw.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn store_user(
    users: &mut Table<'_, &'static str, &'static [u8]>,
    user_id: &str,
    user: &User,
) -> DbResult<()> {
    let bytes = codec::encode_user(user)?;
    users.insert(user_id, bytes.as_slice())?;
    Ok(())
}

/// Load, mutate and write back one user inside `txn`.
pub(crate) fn update_user(
    txn: &WriteTransaction,
    user_id: &str,
    update: impl FnOnce(&mut User),
) -> DbResult<User> {
    let mut users = txn.open_table(USERS)?;
    let mut user = load_user(&users, user_id)?
        .ok_or_else(|| DbError::NotFound(format!("user '{}'", user_id)))?;
    update(&mut user);
    store_user(&mut users, user_id, &user)?;
    Ok(user)
}

impl Database {
    /// Create the user on first login, otherwise refresh display fields only.
    ///
    /// Privilege and the post list always come from the store.
    pub fn sync_user(&self, identity: &UserIdentity) -> DbResult<User> {
        if identity.id.is_empty() {
            return Err(DbError::Validation("user id is empty".into()));
        }

        let user = self.write(|txn| {
            let mut users = txn.open_table(USERS)?;
            let mut user = load_user(&users, &identity.id)?.unwrap_or_default();
            user.avatar_url = identity.avatar_url.clone();
            store_user(&mut users, &identity.id, &user)?;
            Ok(user)
        })?;

        tracing::debug!("Synced user {} (right: {})", identity.id, user.right);
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> DbResult<User> {
        if user_id.is_empty() {
            return Err(DbError::Validation("user id is empty".into()));
        }

        self.read(|txn| {
            let users = txn.open_table(USERS)?;
            load_user(&users, user_id)?
                .ok_or_else(|| DbError::NotFound(format!("user '{}'", user_id)))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::db::models::{UserIdentity, UserRight};
    use crate::db::test_support::open_temp;
    use crate::db::DbError;

    #[test]
    fn sync_creates_user_with_default_right() {
        let (_tmp, db) = open_temp();
        let user = db.sync_user(&UserIdentity::new("alice", "alice.png")).unwrap();
        assert_eq!(user.avatar_url, "alice.png");
        assert_eq!(user.right, UserRight::User);
        assert!(user.post_ids.is_empty());

        assert_eq!(db.get_user("alice").unwrap(), user);
    }

    #[test]
    fn sync_refreshes_avatar_but_keeps_right_and_posts() {
        let (_tmp, db) = open_temp();
        db.sync_user(&UserIdentity::new("alice", "old.png")).unwrap();
        db.set_user_privilege("alice", UserRight::Admin).unwrap();
        let post_id = db.save_user_post("alice", "hello").unwrap();

        let user = db.sync_user(&UserIdentity::new("alice", "new.png")).unwrap();
        assert_eq!(user.avatar_url, "new.png");
        assert_eq!(user.right, UserRight::Admin);
        assert_eq!(user.post_ids, vec![post_id]);
    }

    #[test]
    fn sync_rejects_empty_id() {
        let (_tmp, db) = open_temp();
        let err = db.sync_user(&UserIdentity::new("", "x.png")).unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn get_user_errors() {
        let (_tmp, db) = open_temp();
        assert!(matches!(db.get_user(""), Err(DbError::Validation(_))));
        assert!(matches!(db.get_user("ghost"), Err(DbError::NotFound(_))));
    }
}
