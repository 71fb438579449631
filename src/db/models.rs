use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserRight {
    #[default]
    User,
    Admin,
}

impl UserRight {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRight::User => "user",
            UserRight::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(UserRight::User),
            "admin" => Ok(UserRight::Admin),
            other => Err(format!("unknown user right '{}'", other)),
        }
    }
}

/// A stored user. The id is the key, so it is not part of the record.
///
/// `right` and `post_ids` are owned by the store: logins only ever refresh
/// `avatar_url`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub avatar_url: String,
    #[serde(default)]
    pub right: UserRight,
    /// Oldest first.
    #[serde(default)]
    pub post_ids: Vec<u64>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.right == UserRight::Admin
    }
}

/// What the identity provider tells us about a user on login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub avatar_url: String,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, avatar_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            avatar_url: avatar_url.into(),
        }
    }

    /// Derive the stable user id from the provider login and email.
    pub fn from_provider(login: &str, email: &str, avatar_url: impl Into<String>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(login.as_bytes());
        hasher.update(email.as_bytes());
        Self::new(hex::encode(hasher.finalize()), avatar_url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Original,
    Repost,
    Quote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: u64,
    pub text: String,
    /// Unique user ids; order carries no meaning.
    pub likes: Vec<String>,
    /// UTC, `%Y-%m-%dT%H:%M:%S%.3fZ`
    pub created_at: String,
    pub creator_id: String,
    /// 0 when this is not a repost.
    pub repost_id: u64,
}

impl Post {
    pub fn kind(&self) -> PostKind {
        match (self.repost_id, self.text.is_empty()) {
            (0, _) => PostKind::Original,
            (_, true) => PostKind::Repost,
            (_, false) => PostKind::Quote,
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|id| id == user_id)
    }
}
