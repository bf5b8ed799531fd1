#![allow(clippy::needless_for_each)]

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{debug_span, error, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod guard;
pub mod handlers;
pub mod session;
pub mod state;
pub mod verifier;

use self::{
    handlers::types::{Challenge, MeResponse, SignSubmission, VerifyResponse},
    session::{spawn_purge_task, InMemorySessionStore, SessionState, SessionStore},
    state::{GatewayConfig, GatewayState},
    verifier::Verifier,
};

const REQUEST_ID_HEADER: &str = "x-request-id";
const PURGE_INTERVAL_SECONDS: u64 = 60;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::home::home,
        handlers::login::login,
        handlers::verify::verify,
        handlers::me::me,
        handlers::logout::logout,
    ),
    components(
        schemas(Challenge, SignSubmission, VerifyResponse, MeResponse, SessionState)
    ),
    tags(
        (name = "gateway", description = "DID sign-in challenge and verification"),
        (name = "session", description = "Authorized session management"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the gateway router around an existing state.
///
/// # Errors
/// Returns an error if the CORS configuration holds invalid header values.
pub fn router(state: Arc<GatewayState>) -> Result<Router> {
    let [(origin_name, origin), (headers_name, headers), (methods_name, methods)] = state
        .config()
        .cors()
        .headers()
        .context("Invalid CORS configuration")?;

    let app = Router::new()
        .route("/", get(handlers::home))
        .route("/login", get(handlers::login))
        .route("/verify", post(handlers::verify))
        .route("/me", get(handlers::me))
        .route("/logout", post(handlers::logout))
        .layer(middleware::from_fn_with_state(state.clone(), guard::guard))
        .layer(Extension(state))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::overriding(origin_name, origin))
                .layer(SetResponseHeaderLayer::overriding(headers_name, headers))
                .layer(SetResponseHeaderLayer::overriding(methods_name, methods)),
        );

    Ok(app)
}

/// Start the gateway
/// # Errors
/// Returns an error if the server fails to start
pub async fn new(port: u16, config: GatewayConfig, verifier: Arc<dyn Verifier>) -> Result<()> {
    let store: Arc<dyn SessionStore> = Arc::new(
        InMemorySessionStore::new(Duration::from_secs(config.session_ttl_seconds()))
            .with_pending_ttl(Duration::from_secs(config.pending_session_ttl_seconds())),
    );

    let purge = spawn_purge_task(store.clone(), Duration::from_secs(PURGE_INTERVAL_SECONDS));

    let state = Arc::new(GatewayState::new(config, store, verifier));
    let app = router(state)?;

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    purge.abort();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_gateway_paths() {
        let doc = openapi();
        for path in ["/", "/login", "/verify", "/me", "/logout"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
