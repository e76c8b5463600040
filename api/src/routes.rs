use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::api_utils::latency::track_latency;
use crate::handlers::files::file::upload;
use crate::handlers::friends::friend_handlers::{
    create_friend, delete_friend, get_friends, update_friend,
};
use crate::AppState;

pub(crate) fn app_routes(state: AppState) -> Router {
    Router::new()
        .nest("/friend", friend_routes(state.clone()))
        .nest("/file", file_routes(state))
        .layer(middleware::from_fn(track_latency))
}

fn friend_routes(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_friend))
        .route("/", get(get_friends))
        .route("/:id", put(update_friend))
        .route("/:id", delete(delete_friend))
        .with_state(state)
}

const MAX_FILE_UPLOAD_SIZE: usize = 1024 * 1024 * 50;

fn file_routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_FILE_UPLOAD_SIZE)),
        )
        .with_state(state)
}
