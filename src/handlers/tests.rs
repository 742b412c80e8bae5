use crate::models::{ActionResponse, GeneratedTest, TestQuestion};
use crate::test_storage::NewGeneratedTest;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(tag = "testType", rename_all = "snake_case")]
pub enum CreateTestRequest {
    #[serde(rename_all = "camelCase")]
    Chapterwise {
        subject: String,
        lesson: String,
        #[serde(default)]
        questions: Vec<TestQuestion>,
    },
    #[serde(rename_all = "camelCase")]
    FullLength {
        stream: String,
        #[serde(default)]
        subjects: BTreeMap<String, Vec<TestQuestion>>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTestRequest {
    #[serde(default)]
    pub questions: Option<Vec<TestQuestion>>,
    #[serde(default)]
    pub subjects: Option<BTreeMap<String, Vec<TestQuestion>>>,
}

fn internal<T>(message: &str, e: anyhow::Error) -> (StatusCode, Json<ActionResponse<T>>) {
    tracing::error!("{}: {:#}", message, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ActionResponse::fail(message.to_string())),
    )
}

pub async fn create_test(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTestRequest>,
) -> (StatusCode, Json<ActionResponse<GeneratedTest>>) {
    let draft = match payload {
        CreateTestRequest::Chapterwise {
            subject,
            lesson,
            questions,
        } => {
            if subject.trim().is_empty() || lesson.trim().is_empty() {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ActionResponse::fail("Subject and lesson are required")),
                );
            }
            NewGeneratedTest::Chapterwise {
                subject,
                lesson,
                questions,
            }
        }
        CreateTestRequest::FullLength { stream, subjects } => {
            if stream.trim().is_empty() {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ActionResponse::fail("Stream is required")),
                );
            }
            NewGeneratedTest::FullLength { stream, subjects }
        }
    };

    match state.tests.create(draft).await {
        Ok(test) => (StatusCode::CREATED, Json(ActionResponse::ok(test))),
        Err(e) => internal("Failed to save test", e),
    }
}

pub async fn list_tests(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ActionResponse<Vec<GeneratedTest>>>) {
    let tests = state.tests.list_all().await;
    (StatusCode::OK, Json(ActionResponse::ok(tests)))
}

pub async fn get_test(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> (StatusCode, Json<ActionResponse<GeneratedTest>>) {
    match state.tests.get_by_code(&code).await {
        Some(test) => (StatusCode::OK, Json(ActionResponse::ok(test))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("Test not found")),
        ),
    }
}

pub async fn update_test(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateTestRequest>,
) -> (StatusCode, Json<ActionResponse<GeneratedTest>>) {
    match state
        .tests
        .update_content(&code, payload.questions, payload.subjects)
        .await
    {
        Ok(Ok(test)) => (StatusCode::OK, Json(ActionResponse::ok(test))),
        Ok(Err(message)) => {
            let status = if message == "Test not found" {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(ActionResponse::fail(message)))
        }
        Err(e) => internal("Failed to update test", e),
    }
}

pub async fn delete_test(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> (StatusCode, Json<ActionResponse<()>>) {
    match state.tests.delete(&code).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ActionResponse::ok_with_message((), "Test deleted")),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("Test not found")),
        ),
        Err(e) => internal("Failed to delete test", e),
    }
}
