use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts};
use axum::routing::{delete, get, post, put};
use axum::{Extension, Router};
use tower_http::services::ServeDir;

use heartline_shared::errors::AppError;

use crate::config::PhotoBackend;
use crate::AppState;

pub mod auth;
pub mod discovery;
pub mod health;
pub mod likes;
pub mod messages;
pub mod photos;
pub mod user;
pub mod webhooks;

/// JSON body whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParam<T>(pub T);

pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    let mut app = Router::new()
        .route("/health", get(health::health_check))
        // Local accounts
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // Profile
        .route("/user/init", post(user::init))
        .route("/user/profile", get(user::get_profile).put(user::update_profile))
        .route("/user/location", get(user::get_location).post(user::set_location))
        .route("/user/upload", post(photos::upload).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/user/photo", delete(photos::delete_photo))
        .route("/user/photos/order", put(photos::reorder))
        // Discovery
        .route("/user/all", get(discovery::feed))
        // Social graph
        .route("/user/like/:id", post(likes::like))
        .route("/user/match/:id", post(likes::accept))
        .route("/user/likes-received", get(likes::likes_received))
        .route("/user/likes-sent", get(likes::likes_sent))
        .route("/user/matches", get(likes::matches))
        .route("/user/:id", get(user::public_profile))
        // Messaging
        .route("/messages/send", post(messages::send))
        .route("/messages/conversation/:user_id", get(messages::conversation))
        // Identity provider callbacks (signed, no bearer)
        .route("/webhooks/identity", post(webhooks::identity));

    if state.config.photo_storage == PhotoBackend::Disk {
        app = app.nest_service("/uploads", ServeDir::new(&state.config.upload_dir));
    }

    app.layer(Extension(state.verifier.clone())).with_state(state)
}
