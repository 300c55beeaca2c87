//! # HTTP Route Table
//!
//! [`configure_routes`] is shared by the server and the integration tests so
//! both see the same surface. Unknown paths go to [`not_found`], which the
//! caller mounts as the app's default service.

pub mod chat;

use crate::error::AppError;
use crate::{health, websocket};
use actix_web::{web, HttpResponse};

pub use chat::*;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health::health_check))
            .route("/metrics", web::get().to(health::detailed_metrics)),
    )
    .route("/health", web::get().to(health::health_check))
    .route("/metrics", web::get().to(health::detailed_metrics))
    .route("/agent/chat", web::post().to(chat::chat_new_session))
    .route("/agent/chat/{session_id}", web::post().to(chat::chat))
    .route("/agent/chat/{session_id}/history", web::get().to(chat::get_history))
    .route("/agent/chat/{session_id}/history", web::delete().to(chat::clear_history))
    .route("/ws/audio", web::get().to(websocket::audio_stream));
}

pub async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Endpoint not found".to_string()))
}
