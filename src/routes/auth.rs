use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::auth::session;
use crate::error::AppResult;
use crate::extractors::{CurrentSession, CurrentUser};
use crate::state::AppState;

#[derive(Serialize)]
pub struct Me {
    pub id: String,
    pub avatar_url: String,
    pub right: String,
    pub post_count: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/auth/logout", post(logout))
}

async fn me(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<Json<Me>> {
    let stored = state.db.get_user(&user.id)?;
    Ok(Json(Me {
        id: user.id,
        avatar_url: stored.avatar_url,
        right: stored.right.to_string(),
        post_count: stored.post_ids.len(),
    }))
}

async fn logout(
    State(state): State<AppState>,
    CurrentSession(current): CurrentSession,
) -> Response {
    session::logout(&state.sessions, current.id());

    let cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        state.config.session.cookie_name
    );
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response()
}
