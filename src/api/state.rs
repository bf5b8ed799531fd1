//! Gateway configuration and shared handler state.

use std::sync::Arc;
use url::Url;

use super::{
    guard::CorsConfig,
    session::{SessionStore, DEFAULT_PENDING_SESSION_TTL_SECONDS, DEFAULT_SESSION_TTL_SECONDS},
    verifier::Verifier,
};

/// Paths reachable without an authorized session.
pub const DEFAULT_PUBLIC_PATHS: [&str; 3] = ["/", "/login", "/verify"];

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    public_url: Url,
    session_ttl_seconds: u64,
    pending_session_ttl_seconds: u64,
    public_paths: Vec<String>,
    cors: CorsConfig,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(public_url: Url) -> Self {
        Self {
            public_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            pending_session_ttl_seconds: DEFAULT_PENDING_SESSION_TTL_SECONDS,
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(ToString::to_string).collect(),
            cors: CorsConfig::default(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_pending_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.pending_session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_public_paths(mut self, paths: Vec<String>) -> Self {
        self.public_paths = paths;
        self
    }

    #[must_use]
    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    #[must_use]
    pub fn public_url(&self) -> &Url {
        &self.public_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    /// Lifetime of a session until it is authorized, never above the full TTL.
    #[must_use]
    pub fn pending_session_ttl_seconds(&self) -> u64 {
        self.pending_session_ttl_seconds.min(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn cors(&self) -> &CorsConfig {
        &self.cors
    }

    /// Only mark cookies secure when the gateway is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.public_url.scheme() == "https"
    }

    /// Callback URL handed out as the challenge `client_id`.
    #[must_use]
    pub fn verify_url(&self) -> String {
        format!("{}/verify", self.public_url.as_str().trim_end_matches('/'))
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }
}

pub struct GatewayState {
    config: GatewayConfig,
    store: Arc<dyn SessionStore>,
    verifier: Arc<dyn Verifier>,
}

impl GatewayState {
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        Self {
            config,
            store,
            verifier,
        }
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn verifier(&self) -> &dyn Verifier {
        self.verifier.as_ref()
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
