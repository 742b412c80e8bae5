use crate::models::{ActionResponse, PlatformSettings, ReferralOffer};
use crate::settings_storage::{NewReferralOffer, ReferralOfferUpdate};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    pub code: String,
    pub title: String,
    pub bonus_days: i64,
    pub discount_percent: u8,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOfferRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bonus_days: Option<i64>,
    #[serde(default)]
    pub discount_percent: Option<u8>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active: Option<bool>,
}

fn internal<T>(message: &str, e: anyhow::Error) -> (StatusCode, Json<ActionResponse<T>>) {
    tracing::error!("{}: {:#}", message, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ActionResponse::fail(message.to_string())),
    )
}

pub async fn list_offers(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ActionResponse<Vec<ReferralOffer>>>) {
    (
        StatusCode::OK,
        Json(ActionResponse::ok(state.offers.list().await)),
    )
}

pub async fn active_offers(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ActionResponse<Vec<ReferralOffer>>>) {
    (
        StatusCode::OK,
        Json(ActionResponse::ok(state.offers.active_now().await)),
    )
}

pub async fn create_offer(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOfferRequest>,
) -> (StatusCode, Json<ActionResponse<ReferralOffer>>) {
    let draft = NewReferralOffer {
        code: payload.code.trim().to_uppercase(),
        title: payload.title,
        bonus_days: payload.bonus_days,
        discount_percent: payload.discount_percent,
        starts_at: payload.starts_at.unwrap_or_else(Utc::now),
        ends_at: payload.ends_at,
        active: payload.active,
    };

    match state.offers.create(draft).await {
        Ok(Ok(offer)) => (StatusCode::CREATED, Json(ActionResponse::ok(offer))),
        Ok(Err(message)) => (StatusCode::CONFLICT, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to save offer", e),
    }
}

pub async fn update_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOfferRequest>,
) -> (StatusCode, Json<ActionResponse<ReferralOffer>>) {
    let update = ReferralOfferUpdate {
        title: payload.title,
        bonus_days: payload.bonus_days,
        discount_percent: payload.discount_percent,
        starts_at: payload.starts_at,
        ends_at: payload.ends_at,
        active: payload.active,
    };

    match state.offers.update(&id, update).await {
        Ok(Ok(offer)) => (StatusCode::OK, Json(ActionResponse::ok(offer))),
        Ok(Err(message)) => {
            let status = if message == "Offer not found" {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::BAD_REQUEST
            };
            (status, Json(ActionResponse::fail(message)))
        }
        Err(e) => internal("Failed to update offer", e),
    }
}

pub async fn delete_offer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ActionResponse<()>>) {
    match state.offers.delete(&id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ActionResponse::ok_with_message((), "Offer deleted")),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("Offer not found")),
        ),
        Err(e) => internal("Failed to delete offer", e),
    }
}

pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ActionResponse<PlatformSettings>>) {
    (
        StatusCode::OK,
        Json(ActionResponse::ok(state.settings.get().await)),
    )
}

/// Full-replace semantics: the payload is the entire settings document.
pub async fn replace_settings(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlatformSettings>,
) -> (StatusCode, Json<ActionResponse<PlatformSettings>>) {
    match state.settings.replace(payload).await {
        Ok(settings) => (StatusCode::OK, Json(ActionResponse::ok(settings))),
        Err(e) => internal("Failed to save settings", e),
    }
}
