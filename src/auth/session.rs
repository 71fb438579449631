use std::str::FromStr;

use crate::db::models::{User, UserIdentity, UserRight};
use crate::db::Database;
use crate::error::AppResult;
use crate::session::{Session, SessionError, SessionStore};

pub const USER_ID_KEY: &str = "user_id";
pub const AVATAR_URL_KEY: &str = "avatar_url";
pub const ADMIN_RIGHT_KEY: &str = "admin_right";

/// The logged-in user as recorded in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub avatar_url: String,
    pub right: UserRight,
}

impl SessionUser {
    /// `None` unless a login has been recorded in `session`.
    pub fn from_session(session: &Session) -> Option<Self> {
        let id = session.get_str(USER_ID_KEY).filter(|id| !id.is_empty())?;
        let avatar_url = session.get_str(AVATAR_URL_KEY).unwrap_or_default();
        let right = session
            .get_str(ADMIN_RIGHT_KEY)
            .and_then(|r| UserRight::from_str(&r).ok())
            .unwrap_or_default();
        Some(Self {
            id,
            avatar_url,
            right,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.right == UserRight::Admin
    }
}

/// Record a successful provider login: sync the user with the store, then
/// copy the authoritative fields into the session.
///
/// The provider exchange has already finished by the time this runs, so the
/// store transaction never waits on the network.
///
/// Fails with [`SessionError::NotFound`] if the session was evicted or
/// destroyed meanwhile; the stored user is still synced in that case.
pub fn login(db: &Database, session: &Session, identity: &UserIdentity) -> AppResult<User> {
    let user = db.sync_user(identity)?;
    if let Err(e) = write_user(session, &identity.id, &user) {
        tracing::warn!("Session {} vanished during login: {}", session.id(), e);
        return Err(e.into());
    }
    tracing::info!("User {} logged in", identity.id);
    Ok(user)
}

fn write_user(session: &Session, user_id: &str, user: &User) -> Result<(), SessionError> {
    session.set(USER_ID_KEY, user_id)?;
    session.set(AVATAR_URL_KEY, user.avatar_url.as_str())?;
    session.set(ADMIN_RIGHT_KEY, user.right.as_str())?;
    Ok(())
}

/// End a session. Unknown ids are ignored.
pub fn logout(sessions: &SessionStore, session_id: &str) {
    sessions.destroy(session_id);
}
