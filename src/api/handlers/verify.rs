//! Verification proxy.
//!
//! The `sign` value is forwarded untouched to the external verifier. A
//! negative verdict is a normal `200 {result: false}`; anything that prevents
//! a verdict (bad submission, transport error, timeout, bad response) is a
//! `401` and leaves the session as it was.

use axum::{body::Bytes, extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::types::{SignSubmission, VerifyResponse};
use crate::api::{
    session::{update_session, Session, StoreError},
    state::GatewayState,
};

#[utoipa::path(
    post,
    path = "/verify",
    request_body = SignSubmission,
    responses(
        (status = 200, description = "Verifier verdict", body = VerifyResponse, content_type = "application/json"),
        (status = 401, description = "Submission or verifier call failed", body = VerifyResponse),
    ),
    tag = "gateway"
)]
#[instrument(skip_all)]
pub async fn verify(
    Extension(state): Extension<Arc<GatewayState>>,
    Extension(session): Extension<Session>,
    body: Bytes,
) -> impl IntoResponse {
    let sign = match parse_sign(&body) {
        Ok(sign) => sign,
        Err(message) => {
            debug!("Rejected submission: {message}");
            return unauthorized(message);
        }
    };

    let verdict = match state.verifier().verify(&sign).await {
        Ok(verdict) => verdict,
        Err(err) => {
            error!("Verification failed: {err}");
            return unauthorized(err.to_string());
        }
    };

    if !verdict.result {
        debug!("Verifier rejected signature");
        return (StatusCode::OK, Json(VerifyResponse::verdict(false))).into_response();
    }

    let did = verdict.did;
    match update_session(state.store(), &session.id, |s| s.authorize(did.clone())).await {
        Ok(updated) => {
            info!(did = ?updated.did, "Session authorized");
            (StatusCode::OK, Json(VerifyResponse::verdict(true))).into_response()
        }
        Err(StoreError::NotFound) => unauthorized("session expired".to_string()),
        Err(err) => {
            error!("Failed to authorize session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Pull the `sign` field out of a raw JSON body.
fn parse_sign(body: &[u8]) -> Result<Value, String> {
    let submission: SignSubmission =
        serde_json::from_slice(body).map_err(|err| format!("invalid submission: {err}"))?;

    if submission.sign.is_null() {
        return Err("missing sign field".to_string());
    }

    Ok(submission.sign)
}

fn unauthorized(message: String) -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(VerifyResponse::failure(message)),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_sign_accepts_any_json_value() {
        assert_eq!(parse_sign(br#"{"sign":"abc"}"#), Ok(json!("abc")));
        assert_eq!(
            parse_sign(br#"{"sign":{"r":"1","s":"2"},"extra":true}"#),
            Ok(json!({"r": "1", "s": "2"}))
        );
    }

    #[test]
    fn parse_sign_rejects_bad_submissions() {
        assert!(parse_sign(b"").is_err());
        assert!(parse_sign(b"not json").is_err());
        assert!(parse_sign(b"[]").is_err());
        assert!(parse_sign(br#"{"other":1}"#).is_err());
        assert_eq!(
            parse_sign(br#"{"sign":null}"#),
            Err("missing sign field".to_string())
        );
    }
}
