//! Challenge issuer.
//!
//! The challenge nonce is the session id, which binds a signature to exactly
//! one session. Issuing a challenge marks the session as pending; the verify
//! endpoint does not depend on that mark.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, instrument};

use super::types::{Challenge, VerifyResponse};
use crate::api::{
    session::{update_session, Session, StoreError},
    state::GatewayState,
};

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Sign-in challenge bound to the caller's session", body = Challenge, content_type = "application/json"),
        (status = 401, description = "Session expired while issuing the challenge", body = VerifyResponse),
    ),
    tag = "gateway"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<Arc<GatewayState>>,
    Extension(session): Extension<Session>,
) -> impl IntoResponse {
    match update_session(state.store(), &session.id, Session::issue_challenge).await {
        Ok(_) => (),
        Err(StoreError::NotFound) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(VerifyResponse::failure("session expired")),
            )
                .into_response();
        }
        Err(err) => {
            error!("Failed to record challenge: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let challenge = Challenge {
        client_id: state.config().verify_url(),
        nonce: session.id,
    };

    (StatusCode::OK, Json(challenge)).into_response()
}
