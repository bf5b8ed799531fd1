use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::api::{
    session::{clear_session_cookie, Session},
    state::GatewayState,
};

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Session destroyed and cookie cleared"),
        (status = 401, description = "Session is not authorized"),
    ),
    tag = "session"
)]
#[instrument(skip_all)]
pub async fn logout(
    Extension(state): Extension<Arc<GatewayState>>,
    Extension(session): Extension<Session>,
) -> impl IntoResponse {
    match state.store().destroy(&session.id).await {
        Ok(true) => info!("Session destroyed"),
        Ok(false) => (),
        Err(err) => error!("Failed to destroy session: {err}"),
    }

    // Always clear the cookie, even if the session was already gone.
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config().session_cookie_secure()) {
        headers.insert(SET_COOKIE, cookie);
    }

    (StatusCode::NO_CONTENT, headers)
}
