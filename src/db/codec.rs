// Byte encodings for everything stored as a value.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Post, User};
use crate::db::DbResult;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Fixed-width UTC text; byte order equals chronological order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn encode_user(user: &User) -> DbResult<Vec<u8>> {
    Ok(serde_json::to_vec(user)?)
}

pub fn decode_user(bytes: &[u8]) -> DbResult<User> {
    Ok(serde_json::from_slice(bytes)?)
}

// The post id is the key, so the stored form leaves it out.
#[derive(Serialize)]
struct StoredPostRef<'a> {
    text: &'a str,
    likes: &'a [String],
    created_at: &'a str,
    creator_id: &'a str,
    repost_id: u64,
}

#[derive(Deserialize)]
struct StoredPost {
    text: String,
    #[serde(default)]
    likes: Vec<String>,
    created_at: String,
    creator_id: String,
    #[serde(default)]
    repost_id: u64,
}

pub fn encode_post(post: &Post) -> DbResult<Vec<u8>> {
    let stored = StoredPostRef {
        text: &post.text,
        likes: &post.likes,
        created_at: &post.created_at,
        creator_id: &post.creator_id,
        repost_id: post.repost_id,
    };
    Ok(serde_json::to_vec(&stored)?)
}

pub fn decode_post(id: u64, bytes: &[u8]) -> DbResult<Post> {
    let stored: StoredPost = serde_json::from_slice(bytes)?;
    Ok(Post {
        id,
        text: stored.text,
        likes: stored.likes,
        created_at: stored.created_at,
        creator_id: stored.creator_id,
        repost_id: stored.repost_id,
    })
}
