//! Access guard and CORS settings.
//!
//! Flow Overview: `OPTIONS` is answered immediately. Public paths resolve (or
//! create) the caller's session and pass it on as a request extension. Every
//! other path only looks the session up and answers `401` unless it is
//! authorized, so a denied request never creates or touches a session.

use axum::{
    extract::{Request, State},
    http::{
        header::{
            HeaderName, InvalidHeaderValue, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, SET_COOKIE,
        },
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    session::{extract_session_id, session_cookie},
    state::GatewayState,
};

pub const DEFAULT_ALLOW_ORIGIN: &str = "*";
pub const DEFAULT_ALLOW_HEADERS: &str =
    "Content-Type, Content-Length, Authorization, Accept, X-Requested-With";
pub const DEFAULT_ALLOW_METHODS: &str = "PUT, POST, GET, DELETE, OPTIONS";

/// CORS headers attached to every response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorsConfig {
    allow_origin: String,
    allow_headers: String,
    allow_methods: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: DEFAULT_ALLOW_ORIGIN.to_string(),
            allow_headers: DEFAULT_ALLOW_HEADERS.to_string(),
            allow_methods: DEFAULT_ALLOW_METHODS.to_string(),
        }
    }
}

impl CorsConfig {
    #[must_use]
    pub fn with_allow_origin(mut self, origin: String) -> Self {
        self.allow_origin = origin;
        self
    }

    #[must_use]
    pub fn with_allow_headers(mut self, headers: String) -> Self {
        self.allow_headers = headers;
        self
    }

    #[must_use]
    pub fn with_allow_methods(mut self, methods: String) -> Self {
        self.allow_methods = methods;
        self
    }

    /// Header pairs to set on responses.
    ///
    /// # Errors
    /// Returns an error if a configured value is not a valid header value.
    pub fn headers(&self) -> Result<[(HeaderName, HeaderValue); 3], InvalidHeaderValue> {
        Ok([
            (
                ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_str(&self.allow_origin)?,
            ),
            (
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_str(&self.allow_headers)?,
            ),
            (
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_str(&self.allow_methods)?,
            ),
        ])
    }
}

/// Gate requests on session state before they reach any handler.
pub async fn guard(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    let session_id = extract_session_id(request.headers());
    let public = state.config().is_public(request.uri().path());

    if public {
        let (session, created) = match state.store().get_or_create(session_id.as_deref()).await {
            Ok(found) => found,
            Err(err) => {
                error!("Failed to resolve session: {err}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let cookie = if created {
            match session_cookie(
                &session.id,
                state.config().session_ttl_seconds(),
                state.config().session_cookie_secure(),
            ) {
                Ok(cookie) => Some(cookie),
                Err(err) => {
                    error!("Failed to build session cookie: {err}");
                    return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                }
            }
        } else {
            None
        };

        request.extensions_mut().insert(session);
        let mut response = next.run(request).await;
        if let Some(cookie) = cookie {
            response.headers_mut().append(SET_COOKIE, cookie);
        }

        return response;
    }

    let session = match session_id {
        Some(id) => match state.store().get(&id).await {
            Ok(session) => session.filter(super::session::Session::is_authorized),
            Err(err) => {
                error!("Failed to lookup session: {err}");
                None
            }
        },
        None => None,
    };

    match session {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            debug!("Rejected unauthorized request to {}", request.uri().path());
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}
