//! Request/response types for gateway endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::api::session::SessionState;

/// Sign-in request handed to the client for signing.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Callback URL the signed challenge is posted to.
    pub client_id: String,
    /// The caller's session id.
    pub nonce: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SignSubmission {
    #[schema(value_type = Object)]
    pub sign: Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerifyResponse {
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyResponse {
    #[must_use]
    pub fn verdict(result: bool) -> Self {
        Self {
            result,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            result: false,
            error: Some(error.into()),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub session_id: String,
    pub state: SessionState,
    pub did: Option<String>,
    pub expires_at: u64,
}
