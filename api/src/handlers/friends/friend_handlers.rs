use axum::extract::State;
use axum::Json;
use tracing::{debug, warn};

use abi::errors::Error;
use abi::types::{
    parse_object_id, FriendCreate, FriendResponse, FriendUpdate, FriendView, FriendsResponse,
};

use crate::api_utils::custom_extract::{JsonExtractor, PathExtractor};
use crate::AppState;

pub async fn get_friends(
    State(state): State<AppState>,
) -> Result<Json<FriendsResponse>, Error> {
    let friends = state.db.friend.get_all().await?;
    Ok(Json(FriendsResponse {
        success: true,
        friends: friends.into_iter().map(FriendView::from).collect(),
    }))
}

pub async fn create_friend(
    State(state): State<AppState>,
    JsonExtractor(new_friend): JsonExtractor<FriendCreate>,
) -> Result<Json<FriendResponse>, Error> {
    if new_friend.name.is_empty() || new_friend.link.is_empty() {
        return Err(Error::bad_request("name and link are required"));
    }
    debug!("create friend: {:?}", new_friend.link);
    let friend = state.db.friend.create(new_friend).await?;
    Ok(Json(FriendResponse {
        success: true,
        friend: friend.into(),
    }))
}

pub async fn update_friend(
    State(state): State<AppState>,
    PathExtractor(id): PathExtractor<String>,
    JsonExtractor(mut update): JsonExtractor<FriendUpdate>,
) -> Result<Json<FriendResponse>, Error> {
    let id = parse_object_id(&id)?;
    if update.is_empty() {
        return Err(Error::bad_request("nothing to update"));
    }

    // an avatar hosted elsewhere is copied into owned storage so the
    // url stays stable afterwards
    if let Some(avatar) = update.avatar.clone() {
        if !avatar.starts_with(&state.public_url) {
            match migrate_avatar(&state, &avatar).await {
                Ok(url) => update.avatar = Some(url),
                Err(e) => {
                    // keep the external url rather than failing the update
                    warn!("avatar migration failed for {avatar}: {e}");
                }
            }
        }
    }

    let friend = state.db.friend.update(&id, update).await?;
    Ok(Json(FriendResponse {
        success: true,
        friend: friend.into(),
    }))
}

pub async fn delete_friend(
    State(state): State<AppState>,
    PathExtractor(id): PathExtractor<String>,
) -> Result<Json<FriendsResponse>, Error> {
    let id = parse_object_id(&id)?;
    state.db.friend.delete(&id).await?;
    let friends = state.db.friend.get_all().await?;
    Ok(Json(FriendsResponse {
        success: true,
        friends: friends.into_iter().map(FriendView::from).collect(),
    }))
}

async fn migrate_avatar(state: &AppState, url: &str) -> Result<String, Error> {
    let resp = state.http.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(Error::oss(format!(
            "failed to fetch avatar: {}",
            resp.status()
        )));
    }
    let content_type = resp
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let filename = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("avatar.png")
        .to_string();
    let data = resp.bytes().await?.to_vec();

    state
        .upload
        .upload("avatars", &filename, &content_type, data)
        .await
}
