use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::{Post, PostKind};
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::state::AppState;

/// Upper bound on post text, in bytes.
pub const MAX_POST_LEN: usize = 240;

const DEFAULT_PAGE_SIZE: usize = 64;

// --- View structs ---

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: u64,
    pub kind: PostKind,
    pub text: String,
    pub creator_id: String,
    pub creator_avatar: String,
    pub created_at: String,
    pub like_count: usize,
    pub liked: bool,
    /// The reposted or quoted post, if it still exists.
    pub repost: Option<Box<PostView>>,
}

impl PostView {
    fn build(db: &Database, post: Post, viewer: Option<&str>, embed: bool) -> PostView {
        let kind = post.kind();
        let creator_avatar = db
            .get_user(&post.creator_id)
            .map(|u| u.avatar_url)
            .unwrap_or_default();
        let liked = viewer.map(|v| post.is_liked_by(v)).unwrap_or(false);

        let repost = if embed && kind != PostKind::Original {
            match db.get_user_post(post.repost_id) {
                Ok(target) => Some(Box::new(PostView::build(db, target, viewer, false))),
                Err(e) => {
                    tracing::warn!("Post {} references a missing post: {}", post.id, e);
                    None
                }
            }
        } else {
            None
        };

        PostView {
            id: post.id,
            kind,
            like_count: post.likes.len(),
            liked,
            text: post.text,
            creator_id: post.creator_id,
            creator_avatar,
            created_at: post.created_at,
            repost,
        }
    }
}

// --- Requests ---

#[derive(Deserialize)]
pub struct ListQuery {
    pub count: Option<usize>,
    /// Exclusive cursor: only posts older than this id.
    pub before: Option<u64>,
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub text: String,
}

/// An empty (or absent) `text` makes a pure repost.
#[derive(Deserialize)]
pub struct RepostRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize)]
pub struct CreatedPost {
    pub id: u64,
}

#[derive(Serialize)]
pub struct LikeState {
    pub liked: bool,
}

// --- Router ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{id}/posts", get(list_user_posts))
        .route("/posts", post(create_post))
        .route("/posts/{id}", get(get_post).delete(delete_post))
        .route("/posts/{id}/like", post(toggle_like))
        .route("/posts/{id}/repost", post(repost))
}

fn clean_text(raw: &str) -> AppResult<String> {
    let text = raw.trim();
    if text.len() > MAX_POST_LEN {
        return Err(AppError::BadRequest(format!(
            "Post text must be {} bytes or less",
            MAX_POST_LEN
        )));
    }
    Ok(text.to_string())
}

// --- Handlers ---

async fn list_user_posts(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(owner_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let count = query.count.unwrap_or(DEFAULT_PAGE_SIZE);
    let posts = state
        .db
        .get_latest_user_posts(&owner_id, count, query.before.unwrap_or(0))?;

    let viewer = viewer.map(|u| u.id);
    let views = posts
        .into_iter()
        .map(|p| PostView::build(&state.db, p, viewer.as_deref(), true))
        .collect();
    Ok(Json(views))
}

async fn get_post(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(post_id): Path<u64>,
) -> AppResult<Json<PostView>> {
    let post = state.db.get_user_post(post_id)?;
    let viewer = viewer.map(|u| u.id);
    Ok(Json(PostView::build(&state.db, post, viewer.as_deref(), true)))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<CreatedPost>)> {
    let text = clean_text(&req.text)?;
    if text.is_empty() {
        return Err(AppError::BadRequest("Post text cannot be empty".into()));
    }

    let id = state.db.save_user_post(&user.id, &text)?;
    Ok((StatusCode::CREATED, Json(CreatedPost { id })))
}

async fn repost(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(target_id): Path<u64>,
    Json(req): Json<RepostRequest>,
) -> AppResult<(StatusCode, Json<CreatedPost>)> {
    let text = clean_text(&req.text)?;

    let target = state.db.get_user_post(target_id)?;
    // Reposts chain one level only.
    if target.kind() == PostKind::Quote {
        return Err(AppError::BadRequest("Quotes cannot be reposted".into()));
    }

    let id = state.db.repost_user_post(target_id, &user.id, &text)?;
    Ok((StatusCode::CREATED, Json(CreatedPost { id })))
}

async fn toggle_like(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<u64>,
) -> AppResult<Json<LikeState>> {
    let post = state.db.get_user_post(post_id)?;
    let liked = state
        .db
        .toggle_like_on_post(&post.creator_id, post_id, &user.id)?;
    Ok(Json(LikeState { liked }))
}

async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<u64>,
) -> AppResult<StatusCode> {
    let post = state.db.get_user_post(post_id)?;
    if post.creator_id != user.id {
        return Err(AppError::Forbidden(
            "Only the owner of a post can delete it".into(),
        ));
    }

    state.db.delete_user_post(&user.id, post_id)?;
    Ok(StatusCode::NO_CONTENT)
}
