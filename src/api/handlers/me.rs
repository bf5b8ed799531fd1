use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use super::types::MeResponse;
use crate::api::session::Session;

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Authorized session details", body = MeResponse, content_type = "application/json"),
        (status = 401, description = "Session is not authorized"),
    ),
    tag = "session"
)]
pub async fn me(Extension(session): Extension<Session>) -> impl IntoResponse {
    let body = MeResponse {
        session_id: session.id,
        state: session.state,
        did: session.did,
        expires_at: session.expires_at,
    };

    (StatusCode::OK, Json(body))
}
