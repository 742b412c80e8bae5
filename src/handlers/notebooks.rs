use crate::models::{ActionResponse, Bookmark, Notebook};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookNameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddBookmarkRequest {
    pub question_id: String,
    pub subject: String,
    pub lesson: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagsRequest {
    pub tags: Vec<String>,
}

fn internal<T>(message: &str, e: anyhow::Error) -> (StatusCode, Json<ActionResponse<T>>) {
    tracing::error!("{}: {:#}", message, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ActionResponse::fail(message.to_string())),
    )
}

pub async fn list_notebooks(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<ActionResponse<Vec<Notebook>>>) {
    let notebooks = state.notebooks.list(&user_id).await;
    (StatusCode::OK, Json(ActionResponse::ok(notebooks)))
}

pub async fn create_notebook(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(payload): Json<NotebookNameRequest>,
) -> (StatusCode, Json<ActionResponse<Notebook>>) {
    let name = payload.name.trim();
    if name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail("Notebook name cannot be empty")),
        );
    }

    match state.notebooks.create(&user_id, name.to_string()).await {
        Ok(Ok(notebook)) => (StatusCode::CREATED, Json(ActionResponse::ok(notebook))),
        Ok(Err(message)) => (StatusCode::CONFLICT, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to save notebook", e),
    }
}

pub async fn rename_notebook(
    State(state): State<Arc<AppState>>,
    Path((user_id, notebook_id)): Path<(String, String)>,
    Json(payload): Json<NotebookNameRequest>,
) -> (StatusCode, Json<ActionResponse<Notebook>>) {
    let name = payload.name.trim();
    if name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail("Notebook name cannot be empty")),
        );
    }

    match state
        .notebooks
        .rename(&user_id, &notebook_id, name.to_string())
        .await
    {
        Ok(Ok(notebook)) => (StatusCode::OK, Json(ActionResponse::ok(notebook))),
        Ok(Err(message)) => {
            let status = if message == "Notebook not found" {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::CONFLICT
            };
            (status, Json(ActionResponse::fail(message)))
        }
        Err(e) => internal("Failed to rename notebook", e),
    }
}

pub async fn delete_notebook(
    State(state): State<Arc<AppState>>,
    Path((user_id, notebook_id)): Path<(String, String)>,
) -> (StatusCode, Json<ActionResponse<()>>) {
    match state.notebooks.delete(&user_id, &notebook_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ActionResponse::ok_with_message((), "Notebook deleted")),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("Notebook not found")),
        ),
        Err(e) => internal("Failed to delete notebook", e),
    }
}

pub async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    Path((user_id, notebook_id)): Path<(String, String)>,
    Json(payload): Json<AddBookmarkRequest>,
) -> (StatusCode, Json<ActionResponse<Bookmark>>) {
    if payload.question_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail("questionId cannot be empty")),
        );
    }

    match state
        .notebooks
        .add_bookmark(
            &user_id,
            &notebook_id,
            payload.question_id,
            payload.subject,
            payload.lesson,
            payload.tags,
        )
        .await
    {
        Ok(Ok(bookmark)) => (StatusCode::CREATED, Json(ActionResponse::ok(bookmark))),
        Ok(Err(message)) => (StatusCode::NOT_FOUND, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to save bookmark", e),
    }
}

pub async fn update_bookmark_tags(
    State(state): State<Arc<AppState>>,
    Path((user_id, notebook_id, question_id)): Path<(String, String, String)>,
    Json(payload): Json<UpdateTagsRequest>,
) -> (StatusCode, Json<ActionResponse<Bookmark>>) {
    match state
        .notebooks
        .update_bookmark_tags(&user_id, &notebook_id, &question_id, payload.tags)
        .await
    {
        Ok(Ok(bookmark)) => (StatusCode::OK, Json(ActionResponse::ok(bookmark))),
        Ok(Err(message)) => (StatusCode::NOT_FOUND, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to update bookmark", e),
    }
}

pub async fn remove_bookmark(
    State(state): State<Arc<AppState>>,
    Path((user_id, notebook_id, question_id)): Path<(String, String, String)>,
) -> (StatusCode, Json<ActionResponse<()>>) {
    match state
        .notebooks
        .remove_bookmark(&user_id, &notebook_id, &question_id)
        .await
    {
        Ok(true) => (
            StatusCode::OK,
            Json(ActionResponse::ok_with_message((), "Bookmark removed")),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("Bookmark not found")),
        ),
        Err(e) => internal("Failed to remove bookmark", e),
    }
}
