use crate::config::DEFAULT_REFERRAL_BONUS_DAYS;
use crate::models::ActionResponse;
use crate::user_models::{PlanTier, PublicUser, Role, Subscription, User};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSubscriptionRequest {
    pub plan: PlanTier,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReferralRequest {
    pub code: String,
}

type UserReply = (StatusCode, Json<ActionResponse<PublicUser>>);

fn internal<T>(message: &str, e: anyhow::Error) -> (StatusCode, Json<ActionResponse<T>>) {
    tracing::error!("{}: {:#}", message, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ActionResponse::fail(message.to_string())),
    )
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> UserReply {
    let settings = state.settings.get().await;
    if settings.maintenance_mode {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ActionResponse::fail("The platform is under maintenance")),
        );
    }
    if !settings.registration_open {
        return (
            StatusCode::FORBIDDEN,
            Json(ActionResponse::fail("Registration is currently closed")),
        );
    }

    if payload.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail("Name cannot be empty")),
        );
    }
    if !payload.email.contains('@') {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail("Invalid email address")),
        );
    }
    if payload.password.len() < 6 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail(
                "Password must be at least 6 characters long",
            )),
        );
    }

    let password_hash = match bcrypt::hash(&payload.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(e) => return internal("Failed to hash password", e.into()),
    };

    let user = User::new(
        payload.name.trim().to_string(),
        payload.email.trim().to_lowercase(),
        payload.phone,
        password_hash,
    );

    match state.users.create_user(user).await {
        Ok(Ok(user)) => (
            StatusCode::CREATED,
            Json(ActionResponse::ok(PublicUser::from(user))),
        ),
        Ok(Err(message)) => (StatusCode::CONFLICT, Json(ActionResponse::fail(message))),
        Err(e) => internal("Failed to save user", e),
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> UserReply {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            Json(ActionResponse::fail("Invalid email or password")),
        )
    };

    let user = match state.users.get_by_email(&payload.email).await {
        Some(user) => user,
        None => return invalid(),
    };
    match bcrypt::verify(&payload.password, &user.password_hash) {
        Ok(true) => (
            StatusCode::OK,
            Json(ActionResponse::ok(PublicUser::from(user))),
        ),
        Ok(false) => invalid(),
        Err(e) => internal("Failed to verify password", e.into()),
    }
}

pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RequestOtpRequest>,
) -> (StatusCode, Json<ActionResponse<()>>) {
    if state.users.get_by_email(&payload.email).await.is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("No account with this email")),
        );
    }

    let code = state.otp.issue(&payload.email).await;
    // Demo deployment: the code is logged instead of e-mailed.
    tracing::info!("Password reset OTP for {}: {}", payload.email, code);
    (
        StatusCode::OK,
        Json(ActionResponse::ok_with_message((), "OTP generated")),
    )
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> UserReply {
    if payload.new_password.len() < 6 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail(
                "Password must be at least 6 characters long",
            )),
        );
    }
    if !state.otp.consume(&payload.email, &payload.otp).await {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ActionResponse::fail("Invalid or expired OTP")),
        );
    }

    let user = match state.users.get_by_email(&payload.email).await {
        Some(user) => user,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ActionResponse::fail("No account with this email")),
            )
        }
    };
    let password_hash = match bcrypt::hash(&payload.new_password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(e) => return internal("Failed to hash password", e.into()),
    };

    match state.users.set_password_hash(&user.id, password_hash).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(ActionResponse::ok(PublicUser::from(user))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("User not found")),
        ),
        Err(e) => internal("Failed to update password", e),
    }
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ActionResponse<Vec<PublicUser>>>) {
    let users = state
        .users
        .list()
        .await
        .into_iter()
        .map(PublicUser::from)
        .collect();
    (StatusCode::OK, Json(ActionResponse::ok(users)))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> UserReply {
    match state.users.get(&id).await {
        Some(user) => (
            StatusCode::OK,
            Json(ActionResponse::ok(PublicUser::from(user))),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("User not found")),
        ),
    }
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProfileRequest>,
) -> UserReply {
    if let Some(ref name) = payload.name {
        if name.trim().is_empty() {
            return (
                StatusCode::BAD_REQUEST,
                Json(ActionResponse::fail("Name cannot be empty")),
            );
        }
    }

    match state
        .users
        .update_profile(&id, payload.name, payload.phone)
        .await
    {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(ActionResponse::ok(PublicUser::from(user))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("User not found")),
        ),
        Err(e) => internal("Failed to update user", e),
    }
}

pub async fn set_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SetRoleRequest>,
) -> UserReply {
    match state.users.set_role(&id, payload.role).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(ActionResponse::ok(PublicUser::from(user))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("User not found")),
        ),
        Err(e) => internal("Failed to update role", e),
    }
}

pub async fn set_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SetSubscriptionRequest>,
) -> UserReply {
    let subscription = Subscription {
        plan: payload.plan,
        expires_at: payload.expires_at,
    };
    match state.users.set_subscription(&id, subscription).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(ActionResponse::ok(PublicUser::from(user))),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("User not found")),
        ),
        Err(e) => internal("Failed to update subscription", e),
    }
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ActionResponse<()>>) {
    match state.users.delete(&id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ActionResponse::ok_with_message((), "User deleted")),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("User not found")),
        ),
        Err(e) => internal("Failed to delete user", e),
    }
}

/// Redeems either a scheduled offer code or another user's personal
/// referral code. A personal code also rewards the referrer.
pub async fn apply_referral(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ApplyReferralRequest>,
) -> UserReply {
    let code = payload.code.trim();
    if code.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail("Referral code cannot be empty")),
        );
    }

    let user = match state.users.get(&id).await {
        Some(user) => user,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ActionResponse::fail("User not found")),
            )
        }
    };
    if user.referral_code.eq_ignore_ascii_case(code) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ActionResponse::fail(
                "You cannot redeem your own referral code",
            )),
        );
    }

    if let Some(offer) = state.offers.find_live_by_code(code).await {
        return match state.users.extend_subscription(&id, offer.bonus_days).await {
            Ok(Some(user)) => (
                StatusCode::OK,
                Json(ActionResponse::ok_with_message(
                    PublicUser::from(user),
                    format!("{} days of Pro added", offer.bonus_days),
                )),
            ),
            Ok(None) => (
                StatusCode::NOT_FOUND,
                Json(ActionResponse::fail("User not found")),
            ),
            Err(e) => internal("Failed to apply offer", e),
        };
    }

    let referrer = state
        .users
        .list()
        .await
        .into_iter()
        .find(|candidate| candidate.id != id && candidate.referral_code.eq_ignore_ascii_case(code));
    let referrer = match referrer {
        Some(referrer) => referrer,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(ActionResponse::fail("Invalid or expired referral code")),
            )
        }
    };

    let bonus_days = state
        .offers
        .active_now()
        .await
        .into_iter()
        .map(|offer| offer.bonus_days)
        .max()
        .unwrap_or(DEFAULT_REFERRAL_BONUS_DAYS);

    if let Err(e) = state.users.extend_subscription(&referrer.id, bonus_days).await {
        return internal("Failed to reward referrer", e);
    }
    match state.users.extend_subscription(&id, bonus_days).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(ActionResponse::ok_with_message(
                PublicUser::from(user),
                format!("{} days of Pro added", bonus_days),
            )),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ActionResponse::fail("User not found")),
        ),
        Err(e) => internal("Failed to apply referral", e),
    }
}
