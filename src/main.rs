mod config;
mod follow_storage;
mod handlers;
mod models;
mod notebook_storage;
mod question_bank;
mod settings_storage;
mod store;
mod test_storage;
pub mod user_models;
pub mod user_storage;

use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use follow_storage::FollowStorage;
use models::ActionResponse;
use notebook_storage::NotebookStorage;
use question_bank::QuestionBank;
use settings_storage::{OfferStorage, SettingsStorage};
use std::sync::Arc;
use test_storage::TestStorage;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use user_storage::{OtpCache, UserStorage};

pub struct AppState {
    pub users: UserStorage,
    pub otp: OtpCache,
    pub notebooks: NotebookStorage,
    pub tests: TestStorage,
    pub questions: QuestionBank,
    pub follows: FollowStorage,
    pub offers: OfferStorage,
    pub settings: SettingsStorage,
}

impl AppState {
    fn new(data_dir: &std::path::Path) -> Self {
        Self {
            users: UserStorage::new(data_dir),
            otp: OtpCache::new(),
            notebooks: NotebookStorage::new(data_dir),
            tests: TestStorage::new(data_dir),
            questions: QuestionBank::new(data_dir),
            follows: FollowStorage::new(data_dir),
            offers: OfferStorage::new(data_dir),
            settings: SettingsStorage::new(data_dir),
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = config::data_dir();
    let state = Arc::new(AppState::new(&data_dir));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(handlers::users::signup))
        .route("/auth/login", post(handlers::users::login))
        .route("/auth/request-otp", post(handlers::users::request_otp))
        .route("/auth/reset-password", post(handlers::users::reset_password))
        .route("/users", get(handlers::users::list_users))
        .route(
            "/users/:id",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/users/:id/role", patch(handlers::users::set_role))
        .route(
            "/users/:id/subscription",
            patch(handlers::users::set_subscription),
        )
        .route(
            "/users/:id/apply-referral",
            post(handlers::users::apply_referral),
        )
        .route(
            "/users/:id/notebooks",
            get(handlers::notebooks::list_notebooks).post(handlers::notebooks::create_notebook),
        )
        .route(
            "/users/:id/notebooks/:notebook_id",
            patch(handlers::notebooks::rename_notebook)
                .delete(handlers::notebooks::delete_notebook),
        )
        .route(
            "/users/:id/notebooks/:notebook_id/bookmarks",
            post(handlers::notebooks::add_bookmark),
        )
        .route(
            "/users/:id/notebooks/:notebook_id/bookmarks/:question_id",
            patch(handlers::notebooks::update_bookmark_tags)
                .delete(handlers::notebooks::remove_bookmark),
        )
        .route("/users/:id/follow", post(handlers::follows::follow))
        .route("/users/:id/unfollow", post(handlers::follows::unfollow))
        .route("/users/:id/follows", get(handlers::follows::get_follows))
        .route(
            "/tests",
            get(handlers::tests::list_tests).post(handlers::tests::create_test),
        )
        .route(
            "/tests/:code",
            get(handlers::tests::get_test)
                .patch(handlers::tests::update_test)
                .delete(handlers::tests::delete_test),
        )
        .route("/questions", post(handlers::questions::add_question))
        .route(
            "/questions/:subject/:lesson",
            get(handlers::questions::list_questions),
        )
        .route(
            "/questions/:subject/:lesson/images",
            post(handlers::questions::upload_image),
        )
        .route(
            "/questions/:subject/:lesson/:id",
            get(handlers::questions::get_question)
                .patch(handlers::questions::update_question)
                .delete(handlers::questions::delete_question),
        )
        .route("/practice/daily", get(handlers::questions::daily_practice))
        .route(
            "/offers",
            get(handlers::offers::list_offers).post(handlers::offers::create_offer),
        )
        .route("/offers/active", get(handlers::offers::active_offers))
        .route(
            "/offers/:id",
            patch(handlers::offers::update_offer).delete(handlers::offers::delete_offer),
        )
        .route(
            "/settings",
            get(handlers::offers::get_settings).put(handlers::offers::replace_settings),
        )
        .layer(cors)
        .with_state(state);

    let addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind server address");

    tracing::info!("Exam-prep service listening on {}", addr);
    tracing::info!("Data directory: {}", data_dir.display());

    axum::serve(listener, app).await.expect("Failed to start server");
}

async fn health() -> (StatusCode, Json<ActionResponse<&'static str>>) {
    (StatusCode::OK, Json(ActionResponse::ok("ok")))
}
