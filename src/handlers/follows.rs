use crate::follow_storage::FollowRecord;
use crate::models::ActionResponse;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub target_id: String,
}

fn internal<T>(message: &str, e: anyhow::Error) -> (StatusCode, Json<ActionResponse<T>>) {
    tracing::error!("{}: {:#}", message, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ActionResponse::fail(message.to_string())),
    )
}

pub async fn get_follows(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<ActionResponse<FollowRecord>>) {
    let record = state.follows.get(&user_id).await;
    (StatusCode::OK, Json(ActionResponse::ok(record)))
}

pub async fn follow(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<FollowRequest>,
) -> (StatusCode, Json<ActionResponse<FollowRecord>>) {
    if state.users.get(&payload.target_id).await.is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("User not found")),
        );
    }

    match state.follows.follow(&user_id, &payload.target_id).await {
        Ok(Ok(())) => {
            let record = state.follows.get(&user_id).await;
            (StatusCode::OK, Json(ActionResponse::ok(record)))
        }
        Ok(Err(message)) => (StatusCode::BAD_REQUEST, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to update follow graph", e),
    }
}

pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<FollowRequest>,
) -> (StatusCode, Json<ActionResponse<FollowRecord>>) {
    match state.follows.unfollow(&user_id, &payload.target_id).await {
        Ok(Ok(())) => {
            let record = state.follows.get(&user_id).await;
            (StatusCode::OK, Json(ActionResponse::ok(record)))
        }
        Ok(Err(message)) => (StatusCode::BAD_REQUEST, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to update follow graph", e),
    }
}
