use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/pages/{title}", get(view_page).put(save_page))
}

async fn view_page(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> AppResult<Response> {
    let body = state.db.get_page(&title)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

async fn save_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(title): Path<String>,
    body: Bytes,
) -> AppResult<StatusCode> {
    state.db.save_page(&title, &body)?;
    tracing::info!("Page '{}' saved by {}", title, user.id);
    Ok(StatusCode::NO_CONTENT)
}
