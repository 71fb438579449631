use chrono::Utc;
use redb::{ReadableTable, WriteTransaction};

use crate::db::codec;
use crate::db::models::Post;
use crate::db::tables::{self, post_key, Keyspace, POSTS, USERS};
use crate::db::users::{load_user, store_user, update_user};
use crate::db::{Database, DbError, DbResult};

pub(crate) fn load_post<T>(posts: &T, post_id: u64) -> DbResult<Option<Post>>
where
    T: ReadableTable<&'static [u8], &'static [u8]>,
{
    let key = post_key(post_id);
    match posts.get(key.as_slice())? {
        Some(raw) => Ok(Some(codec::decode_post(post_id, raw.value())?)),
        None => Ok(None),
    }
}

fn post_not_found(post_id: u64) -> DbError {
    DbError::NotFound(format!("post {}", post_id))
}

/// Mint an id, link it into the owner's post list and write the post.
///
/// All three happen in the caller's transaction: if any step fails the
/// transaction aborts and neither the list nor the posts keyspace changes.
fn insert_post(
    txn: &WriteTransaction,
    owner_id: &str,
    text: &str,
    repost_id: u64,
) -> DbResult<u64> {
    let mut users = txn.open_table(USERS)?;
    let mut owner = load_user(&users, owner_id)?
        .ok_or_else(|| DbError::NotFound(format!("user '{}'", owner_id)))?;

    let post_id = tables::next_sequence(txn, Keyspace::Posts)?;
    owner.post_ids.push(post_id);
    store_user(&mut users, owner_id, &owner)?;

    let post = Post {
        id: post_id,
        text: text.to_string(),
        likes: Vec::new(),
        created_at: codec::timestamp(Utc::now()),
        creator_id: owner_id.to_string(),
        repost_id,
    };
    let bytes = codec::encode_post(&post)?;
    let mut posts = txn.open_table(POSTS)?;
    posts.insert(post_key(post_id).as_slice(), bytes.as_slice())?;

    Ok(post_id)
}

/// Add `liker_id` if absent, remove it otherwise. Returns whether it is now present.
fn toggle_like(likes: &mut Vec<String>, liker_id: &str) -> bool {
    match likes.iter().position(|id| id == liker_id) {
        Some(index) => {
            likes.swap_remove(index);
            false
        }
        None => {
            likes.push(liker_id.to_string());
            true
        }
    }
}

impl Database {
    pub fn save_user_post(&self, owner_id: &str, text: &str) -> DbResult<u64> {
        if text.is_empty() {
            return Err(DbError::Validation("post text is empty".into()));
        }

        let post_id = self.write(|txn| insert_post(txn, owner_id, text, 0))?;
        tracing::debug!("Saved post {} for {}", post_id, owner_id);
        Ok(post_id)
    }

    /// Repost `target_post_id` as `reposter_id`. Empty `text` makes a pure
    /// repost, anything else a quote.
    pub fn repost_user_post(
        &self,
        target_post_id: u64,
        reposter_id: &str,
        text: &str,
    ) -> DbResult<u64> {
        if target_post_id == 0 {
            return Err(DbError::Validation("repost target id is 0".into()));
        }

        let post_id = self.write(|txn| {
            {
                let posts = txn.open_table(POSTS)?;
                if posts.get(post_key(target_post_id).as_slice())?.is_none() {
                    return Err(post_not_found(target_post_id));
                }
            }
            insert_post(txn, reposter_id, text, target_post_id)
        })?;

        tracing::debug!("{} reposted {} as {}", reposter_id, target_post_id, post_id);
        Ok(post_id)
    }

    /// Toggle `liker_id` in the like set of a post. Returns whether the post is
    /// liked by `liker_id` afterwards.
    pub fn toggle_like_on_post(
        &self,
        owner_id: &str,
        post_id: u64,
        liker_id: &str,
    ) -> DbResult<bool> {
        self.write(|txn| {
            let mut posts = txn.open_table(POSTS)?;
            let mut post = load_post(&posts, post_id)?.ok_or_else(|| {
                DbError::NotFound(format!(
                    "post {} of user '{}' liked by '{}'",
                    post_id, owner_id, liker_id
                ))
            })?;

            let liked = toggle_like(&mut post.likes, liker_id);
            let bytes = codec::encode_post(&post)?;
            posts.insert(post_key(post_id).as_slice(), bytes.as_slice())?;
            Ok(liked)
        })
    }

    /// Delete a post and unlink it from its owner. Unknown ids are a no-op.
    pub fn delete_user_post(&self, owner_id: &str, post_id: u64) -> DbResult<()> {
        tracing::info!("Deleting post {} of {}", post_id, owner_id);
        self.write(|txn| {
            {
                let mut posts = txn.open_table(POSTS)?;
                if let Some(post) = load_post(&posts, post_id)? {
                    if post.creator_id != owner_id {
                        return Err(DbError::Validation(format!(
                            "post {} is not owned by '{}'",
                            post_id, owner_id
                        )));
                    }
                }
                posts.remove(post_key(post_id).as_slice())?;
            }
            update_user(txn, owner_id, |user| user.post_ids.retain(|id| *id != post_id))?;
            Ok(())
        })
    }

    /// Newest-first page of an owner's posts.
    ///
    /// With `cursor_post_id == 0` the page starts at the most recent post,
    /// otherwise strictly before the cursor. Ids whose post has gone missing are
    /// skipped with a warning.
    pub fn get_latest_user_posts(
        &self,
        owner_id: &str,
        max_count: usize,
        cursor_post_id: u64,
    ) -> DbResult<Vec<Post>> {
        let result = self.read(|txn| {
            let users = txn.open_table(USERS)?;
            let owner = load_user(&users, owner_id)?
                .ok_or_else(|| DbError::NotFound(format!("user '{}'", owner_id)))?;

            let end = if cursor_post_id == 0 {
                owner.post_ids.len()
            } else {
                owner
                    .post_ids
                    .iter()
                    .position(|id| *id == cursor_post_id)
                    .ok_or_else(|| {
                        DbError::NotFound(format!(
                            "cursor post {} is not among the posts of '{}'",
                            cursor_post_id, owner_id
                        ))
                    })?
            };

            let posts = txn.open_table(POSTS)?;
            let mut page = Vec::with_capacity(max_count.min(end));
            for &post_id in owner.post_ids[..end].iter().rev() {
                if page.len() >= max_count {
                    break;
                }
                match load_post(&posts, post_id)? {
                    Some(post) => page.push(post),
                    None => tracing::warn!(
                        "Post {} of '{}' is missing from the posts keyspace",
                        post_id,
                        owner_id
                    ),
                }
            }
            Ok(page)
        })?;

        tracing::debug!(
            "Loaded {} posts of {} (max {}, before {})",
            result.len(),
            owner_id,
            max_count,
            cursor_post_id
        );
        Ok(result)
    }

    pub fn get_user_post(&self, post_id: u64) -> DbResult<Post> {
        self.read(|txn| {
            let posts = txn.open_table(POSTS)?;
            load_post(&posts, post_id)?.ok_or_else(|| post_not_found(post_id))
        })
    }

    /// Fetch exactly the requested posts, in request order. Any missing id
    /// fails the whole call.
    pub fn get_user_posts(&self, ids: &[u64]) -> DbResult<Vec<Post>> {
        if ids.is_empty() {
            return Err(DbError::Validation("no posts were requested".into()));
        }

        self.read(|txn| {
            let posts = txn.open_table(POSTS)?;
            ids.iter()
                .map(|&id| load_post(&posts, id)?.ok_or_else(|| post_not_found(id)))
                .collect()
        })
    }
}
