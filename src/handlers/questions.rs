use crate::models::{ActionResponse, BankQuestion, PyqInfo, QuestionContent};
use crate::question_bank::{BankQuestionUpdate, NewBankQuestion};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddQuestionRequest {
    pub subject: String,
    pub lesson: String,
    pub question: QuestionContent,
    pub options: Vec<String>,
    pub correct_option: u8,
    #[serde(default)]
    pub explanation: Option<QuestionContent>,
    #[serde(default)]
    pub pyq: Option<PyqInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionRequest {
    #[serde(default)]
    pub question: Option<QuestionContent>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_option: Option<u8>,
    #[serde(default)]
    pub explanation: Option<QuestionContent>,
    #[serde(default)]
    pub pyq: Option<PyqInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageRequest {
    pub filename: String,
    /// Base64-encoded image bytes.
    pub data: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageResponse {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPracticeParams {
    pub subject: String,
    pub lesson: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn internal<T>(message: &str, e: anyhow::Error) -> (StatusCode, Json<ActionResponse<T>>) {
    tracing::error!("{}: {:#}", message, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ActionResponse::fail(message.to_string())),
    )
}

pub async fn add_question(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddQuestionRequest>,
) -> (StatusCode, Json<ActionResponse<BankQuestion>>) {
    let draft = NewBankQuestion {
        subject: payload.subject,
        lesson: payload.lesson,
        question: payload.question,
        options: payload.options,
        correct_option: payload.correct_option,
        explanation: payload.explanation,
        pyq: payload.pyq,
    };

    match state.questions.add(draft).await {
        Ok(Ok(question)) => (StatusCode::CREATED, Json(ActionResponse::ok(question))),
        Ok(Err(message)) => (StatusCode::BAD_REQUEST, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to save question", e),
    }
}

pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Path((subject, lesson)): Path<(String, String)>,
) -> (StatusCode, Json<ActionResponse<Vec<BankQuestion>>>) {
    let questions = state.questions.list(&subject, &lesson).await;
    (StatusCode::OK, Json(ActionResponse::ok(questions)))
}

pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Path((subject, lesson, id)): Path<(String, String, String)>,
) -> (StatusCode, Json<ActionResponse<BankQuestion>>) {
    match state.questions.get(&subject, &lesson, &id).await {
        Some(question) => (StatusCode::OK, Json(ActionResponse::ok(question))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("Question not found")),
        ),
    }
}

pub async fn update_question(
    State(state): State<Arc<AppState>>,
    Path((subject, lesson, id)): Path<(String, String, String)>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> (StatusCode, Json<ActionResponse<BankQuestion>>) {
    let update = BankQuestionUpdate {
        question: payload.question,
        options: payload.options,
        correct_option: payload.correct_option,
        explanation: payload.explanation,
        pyq: payload.pyq,
    };

    match state.questions.update(&subject, &lesson, &id, update).await {
        Ok(Ok(question)) => (StatusCode::OK, Json(ActionResponse::ok(question))),
        Ok(Err(message)) => {
            let status = if message == "Question not found" {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(ActionResponse::fail(message)))
        }
        Err(e) => internal("Failed to update question", e),
    }
}

pub async fn delete_question(
    State(state): State<Arc<AppState>>,
    Path((subject, lesson, id)): Path<(String, String, String)>,
) -> (StatusCode, Json<ActionResponse<()>>) {
    match state.questions.delete(&subject, &lesson, &id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ActionResponse::ok_with_message((), "Question deleted")),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("Question not found")),
        ),
        Err(e) => internal("Failed to delete question", e),
    }
}

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path((subject, lesson)): Path<(String, String)>,
    Json(payload): Json<UploadImageRequest>,
) -> (StatusCode, Json<ActionResponse<UploadImageResponse>>) {
    let bytes = match BASE64.decode(payload.data.as_bytes()) {
        Ok(bytes) => bytes,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ActionResponse::fail("Image data is not valid base64")),
            )
        }
    };
    let prefix = payload.prefix.unwrap_or_else(|| "question".to_string());

    match state
        .questions
        .save_image(&subject, &lesson, &prefix, &payload.filename, &bytes)
        .await
    {
        Ok(Ok(filename)) => (
            StatusCode::CREATED,
            Json(ActionResponse::ok(UploadImageResponse { filename })),
        ),
        Ok(Err(message)) => (StatusCode::BAD_REQUEST, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to store image", e),
    }
}

pub async fn daily_practice(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DailyPracticeParams>,
) -> (StatusCode, Json<ActionResponse<Vec<BankQuestion>>>) {
    let date = params.date.unwrap_or_else(|| Utc::now().date_naive());
    let limit = match params.limit {
        Some(limit) => limit,
        None => state.settings.get().await.daily_practice_limit,
    };

    let questions = state
        .questions
        .daily_practice(&params.subject, &params.lesson, date, limit)
        .await;
    (StatusCode::OK, Json(ActionResponse::ok(questions)))
}
