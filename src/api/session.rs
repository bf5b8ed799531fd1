//! Sessions, the session store and the session cookie.
//!
//! Every client gets an opaque session id on first contact with a public path.
//! The id doubles as the challenge nonce, so it must be unguessable and unique:
//! 32 bytes from the OS RNG, base64url encoded without padding.

use async_trait::async_trait;
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use dashmap::{mapref::entry::Entry, DashMap};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use utoipa::ToSchema;

pub const SESSION_COOKIE_NAME: &str = "didgate_session";
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
/// Lifetime of a session until it is authorized.
pub const DEFAULT_PENDING_SESSION_TTL_SECONDS: u64 = 10 * 60;

// Default `SessionStore::update` retries a compare-and-set this many times.
const MAX_UPDATE_ATTEMPTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    ChallengeIssued,
    Authorized,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub state: SessionState,
    pub did: Option<String>,
    pub created_at: u64,
    pub expires_at: u64,
    version: u64,
}

impl Session {
    fn new(id: String, ttl: Duration) -> Self {
        let now = unix_now();
        Self {
            id,
            state: SessionState::Unauthenticated,
            did: None,
            created_at: now,
            expires_at: now.saturating_add(ttl.as_secs()),
            version: 0,
        }
    }

    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.state == SessionState::Authorized
    }

    #[must_use]
    pub fn is_expired_at(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    /// Store version this copy was read at.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Mark a pending challenge. Returns `false` when nothing changed.
    ///
    /// Authorized sessions stay authorized.
    pub fn issue_challenge(&mut self) -> bool {
        if self.state == SessionState::Unauthenticated {
            self.state = SessionState::ChallengeIssued;
            true
        } else {
            false
        }
    }

    /// Promote the session after a positive verdict, binding `did` when known.
    pub fn authorize(&mut self, did: Option<String>) -> bool {
        let changed = self.state != SessionState::Authorized || (did.is_some() && did != self.did);
        self.state = SessionState::Authorized;
        if did.is_some() {
            self.did = did;
        }
        changed
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found")]
    NotFound,
    #[error("session was modified concurrently (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },
    #[error("failed to generate session id: {0}")]
    Entropy(String),
}

/// Backing storage for sessions.
///
/// Implementations must make every single-session operation linearizable;
/// `save` is a compare-and-set on [`Session::version`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a live session. Expired sessions are treated as absent.
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Return the session for `id`, or create a fresh one with a new id.
    ///
    /// The boolean is `true` when a session was created.
    async fn get_or_create(&self, id: Option<&str>) -> Result<(Session, bool), StoreError>;

    /// Persist `session` if nobody else saved it since it was read.
    async fn save(&self, session: &Session) -> Result<Session, StoreError>;

    /// Apply `apply` to the session and persist it if it reports a change.
    ///
    /// The default is a read then compare-and-set loop over [`get`](Self::get)
    /// and [`save`](Self::save). Stores that can lock a single session should
    /// override it and apply the change in place.
    async fn update(
        &self,
        id: &str,
        apply: &(dyn for<'s> Fn(&'s mut Session) -> bool + Send + Sync),
    ) -> Result<Session, StoreError> {
        let mut last_error = StoreError::NotFound;

        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let Some(mut session) = self.get(id).await? else {
                return Err(StoreError::NotFound);
            };

            if !apply(&mut session) {
                return Ok(session);
            }

            match self.save(&session).await {
                Ok(saved) => return Ok(saved),
                Err(err @ StoreError::Conflict { .. }) => {
                    debug!("Retrying session update: {err}");
                    last_error = err;
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error)
    }

    /// Remove a session. Returns `true` if it existed.
    async fn destroy(&self, id: &str) -> Result<bool, StoreError>;

    /// Drop every expired session and return how many were removed.
    async fn purge_expired(&self) -> Result<usize, StoreError>;
}

/// Process-local session store for single instance deployments.
///
/// New sessions live for the pending TTL. Authorizing a session extends it to
/// the full TTL, so anonymous sessions that never sign in are purged early.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
    ttl: Duration,
    pending_ttl: Duration,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            pending_ttl: ttl.min(Duration::from_secs(DEFAULT_PENDING_SESSION_TTL_SECONDS)),
        }
    }

    /// Lifetime of sessions that are not authorized yet, capped at the full TTL.
    #[must_use]
    pub fn with_pending_ttl(mut self, pending_ttl: Duration) -> Self {
        self.pending_ttl = pending_ttl.min(self.ttl);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // Sessions reaching Authorized get the full TTL from that moment.
    fn stamp(&self, previous: &Session, next: &mut Session, now: u64) {
        next.version = previous.version.wrapping_add(1);
        if next.is_authorized() && !previous.is_authorized() {
            next.expires_at = now.saturating_add(self.ttl.as_secs());
        }
    }

    fn insert_new(&self) -> Result<Session, StoreError> {
        loop {
            let id = generate_session_id()?;
            if let Entry::Vacant(entry) = self.sessions.entry(id.clone()) {
                let session = Session::new(id, self.pending_ttl);
                entry.insert(session.clone());
                return Ok(session);
            }
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let now = unix_now();
        let expired = match self.sessions.get(id) {
            Some(session) if !session.is_expired_at(now) => return Ok(Some(session.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions
                .remove_if(id, |_, session| session.is_expired_at(now));
            debug!("Removed expired session");
        }

        Ok(None)
    }

    async fn get_or_create(&self, id: Option<&str>) -> Result<(Session, bool), StoreError> {
        if let Some(id) = id {
            if let Some(session) = self.get(id).await? {
                return Ok((session, false));
            }
        }

        // Unknown ids from the client are never adopted.
        let session = self.insert_new()?;
        debug!("Created new session");

        Ok((session, true))
    }

    async fn save(&self, session: &Session) -> Result<Session, StoreError> {
        let now = unix_now();
        let Some(mut current) = self.sessions.get_mut(&session.id) else {
            return Err(StoreError::NotFound);
        };

        if current.is_expired_at(now) {
            return Err(StoreError::NotFound);
        }

        if current.version != session.version {
            return Err(StoreError::Conflict {
                expected: session.version,
                found: current.version,
            });
        }

        let mut next = session.clone();
        self.stamp(&current, &mut next, now);
        *current = next.clone();

        Ok(next)
    }

    async fn update(
        &self,
        id: &str,
        apply: &(dyn for<'s> Fn(&'s mut Session) -> bool + Send + Sync),
    ) -> Result<Session, StoreError> {
        let now = unix_now();
        let Some(mut current) = self.sessions.get_mut(id) else {
            return Err(StoreError::NotFound);
        };

        if current.is_expired_at(now) {
            return Err(StoreError::NotFound);
        }

        // The entry stays locked, so the change cannot race another writer.
        let mut next = current.clone();
        if !apply(&mut next) {
            return Ok(next);
        }
        self.stamp(&current, &mut next, now);
        *current = next.clone();

        Ok(next)
    }

    async fn destroy(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = unix_now();
        let mut removed = 0;
        self.sessions.retain(|_, session| {
            let keep = !session.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}

/// Read-modify-write a session through [`SessionStore::update`].
///
/// `apply` returns `false` when it made no change, in which case nothing is saved.
///
/// # Errors
/// Returns `NotFound` if the session is gone. Stores relying on the default
/// compare-and-set loop may also return `Conflict`.
pub async fn update_session<F>(
    store: &dyn SessionStore,
    id: &str,
    apply: F,
) -> Result<Session, StoreError>
where
    F: Fn(&mut Session) -> bool + Send + Sync,
{
    store.update(id, &apply).await
}

/// Periodically purge expired sessions until the task is aborted.
pub fn spawn_purge_task(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!("Purged {removed} expired sessions"),
                Err(err) => error!("Failed to purge expired sessions: {err}"),
            }
        }
    })
}

/// Create a new random session id.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub fn generate_session_id() -> Result<String, StoreError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| StoreError::Entropy(err.to_string()))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Session ids are always 43 base64url characters.
#[must_use]
pub fn valid_session_id(id: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{43}$").is_ok_and(|re| re.is_match(id))
}

/// Read the session id from the request cookie, ignoring malformed values.
#[must_use]
pub fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && valid_session_id(val) {
                return Some(val.to_string());
            }
        }
    }

    None
}

/// Build the `HttpOnly` session cookie.
///
/// # Errors
/// Returns an error if the id contains characters not allowed in a header.
pub fn session_cookie(
    id: &str,
    ttl_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build a cookie that makes the browser drop the session.
///
/// # Errors
/// Never in practice; the value is static apart from the `Secure` flag.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn store() -> InMemorySessionStore {
        InMemorySessionStore::new(Duration::from_secs(60))
    }

    #[test]
    fn generated_ids_are_valid_and_distinct() -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let id = generate_session_id()?;
            assert!(valid_session_id(&id), "unexpected id format: {id}");
            assert!(seen.insert(id));
        }
        Ok(())
    }

    #[test]
    fn valid_session_id_rejects_garbage() {
        assert!(!valid_session_id(""));
        assert!(!valid_session_id("short"));
        assert!(!valid_session_id(&"a".repeat(44)));
        assert!(!valid_session_id(&format!("{};", "a".repeat(42))));
        assert!(valid_session_id(&"a".repeat(43)));
    }

    #[test]
    fn extract_session_id_reads_cookie() {
        let id = "A".repeat(43);
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE_NAME}={id}"))
                .unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        assert_eq!(extract_session_id(&headers), Some(id));
    }

    #[test]
    fn extract_session_id_ignores_malformed_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("didgate_session=../../etc/passwd"),
        );
        assert_eq!(extract_session_id(&headers), None);
        assert_eq!(extract_session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn session_cookie_flags() -> Result<(), InvalidHeaderValue> {
        let cookie = session_cookie("abc", 120, false)?;
        assert_eq!(
            cookie.to_str().unwrap_or_default(),
            "didgate_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=120"
        );

        let cookie = session_cookie("abc", 120, true)?;
        assert!(cookie.to_str().unwrap_or_default().ends_with("; Secure"));

        let cleared = clear_session_cookie(false)?;
        assert!(cleared.to_str().unwrap_or_default().contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn state_transitions_only_move_forward() {
        let mut session = Session::new("id".to_string(), Duration::from_secs(60));
        assert_eq!(session.state, SessionState::Unauthenticated);

        assert!(session.issue_challenge());
        assert_eq!(session.state, SessionState::ChallengeIssued);
        assert!(!session.issue_challenge());

        assert!(session.authorize(Some("did:example:alice".to_string())));
        assert_eq!(session.state, SessionState::Authorized);
        assert_eq!(session.did.as_deref(), Some("did:example:alice"));

        // a new challenge never downgrades an authorized session
        assert!(!session.issue_challenge());
        assert!(session.is_authorized());

        // re-verifying without a did keeps the bound one
        assert!(!session.authorize(None));
        assert_eq!(session.did.as_deref(), Some("did:example:alice"));
    }

    #[test]
    fn authorize_directly_from_unauthenticated() {
        let mut session = Session::new("id".to_string(), Duration::from_secs(60));
        assert!(session.authorize(None));
        assert!(session.is_authorized());
        assert_eq!(session.did, None);
    }

    #[tokio::test]
    async fn get_or_create_reuses_known_sessions() -> Result<(), StoreError> {
        let store = store();
        let (first, created) = store.get_or_create(None).await?;
        assert!(created);

        let (again, created) = store.get_or_create(Some(&first.id)).await?;
        assert!(!created);
        assert_eq!(again, first);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn get_or_create_never_adopts_client_ids() -> Result<(), StoreError> {
        let store = store();
        let forged = "B".repeat(43);
        let (session, created) = store.get_or_create(Some(&forged)).await?;
        assert!(created);
        assert_ne!(session.id, forged);
        Ok(())
    }

    #[tokio::test]
    async fn save_is_compare_and_set() -> Result<(), StoreError> {
        let store = store();
        let (session, _) = store.get_or_create(None).await?;

        let mut first = session.clone();
        first.issue_challenge();
        let saved = store.save(&first).await?;
        assert_eq!(saved.version(), session.version() + 1);

        // stale copy loses
        let mut stale = session;
        stale.authorize(None);
        assert!(matches!(
            store.save(&stale).await,
            Err(StoreError::Conflict { .. })
        ));

        let current = store.get(&saved.id).await?;
        assert_eq!(current.map(|s| s.state), Some(SessionState::ChallengeIssued));
        Ok(())
    }

    #[tokio::test]
    async fn save_after_destroy_is_not_found() -> Result<(), StoreError> {
        let store = store();
        let (session, _) = store.get_or_create(None).await?;
        assert!(store.destroy(&session.id).await?);
        assert!(!store.destroy(&session.id).await?);
        assert!(matches!(
            store.save(&session).await,
            Err(StoreError::NotFound)
        ));
        assert!(store.get(&session.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn expired_sessions_are_hidden_and_purged() -> Result<(), StoreError> {
        let store = InMemorySessionStore::new(Duration::ZERO);
        let (first, _) = store.get_or_create(None).await?;
        let (_second, _) = store.get_or_create(None).await?;
        assert_eq!(store.len(), 2);

        assert!(store.get(&first.id).await?.is_none());
        assert_eq!(store.len(), 1);

        assert_eq!(store.purge_expired().await?, 1);
        assert!(store.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn update_session_applies_change() -> Result<(), StoreError> {
        let store = store();
        let (session, _) = store.get_or_create(None).await?;

        let updated = update_session(&store, &session.id, |s| {
            s.authorize(Some("did:example:bob".to_string()))
        })
        .await?;
        assert!(updated.is_authorized());

        // no-op updates do not bump the version
        let unchanged = update_session(&store, &session.id, Session::issue_challenge).await?;
        assert_eq!(unchanged.version(), updated.version());
        Ok(())
    }

    #[tokio::test]
    async fn update_session_missing_is_not_found() {
        let store = store();
        let result = update_session(&store, "missing", |_| true).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn concurrent_updates_do_not_lose_authorization() -> Result<(), StoreError> {
        let store = Arc::new(store());
        let (session, _) = store.get_or_create(None).await?;

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let id = session.id.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    update_session(store.as_ref(), &id, |s| s.authorize(None)).await
                } else {
                    update_session(store.as_ref(), &id, Session::issue_challenge).await
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let current = store.get(&session.id).await?;
        assert_eq!(current.map(|s| s.state), Some(SessionState::Authorized));
        Ok(())
    }

    #[tokio::test]
    async fn purge_task_removes_expired_sessions() -> Result<(), StoreError> {
        let memory = Arc::new(InMemorySessionStore::new(Duration::ZERO));
        memory.get_or_create(None).await?;
        let store: Arc<dyn SessionStore> = memory.clone();

        let handle = spawn_purge_task(store, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert!(memory.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn pending_sessions_expire_before_authorized_ones() -> Result<(), StoreError> {
        let store = InMemorySessionStore::new(Duration::from_secs(3600))
            .with_pending_ttl(Duration::from_secs(60));
        let (session, _) = store.get_or_create(None).await?;
        assert_eq!(session.expires_at - session.created_at, 60);

        let challenged = update_session(&store, &session.id, Session::issue_challenge).await?;
        assert_eq!(challenged.expires_at, session.expires_at);

        let authorized = update_session(&store, &session.id, |s| s.authorize(None)).await?;
        assert!(authorized.expires_at >= session.created_at + 3600);
        Ok(())
    }

    #[test]
    fn pending_ttl_never_exceeds_full_ttl() {
        let capped =
            InMemorySessionStore::new(Duration::from_secs(30)).with_pending_ttl(Duration::MAX);
        assert_eq!(capped.pending_ttl, Duration::from_secs(30));
        assert_eq!(store().pending_ttl, Duration::from_secs(60));
        assert_eq!(
            InMemorySessionStore::default().pending_ttl,
            Duration::from_secs(DEFAULT_PENDING_SESSION_TTL_SECONDS)
        );
    }

    #[tokio::test]
    async fn update_in_place_has_no_retry_limit() -> Result<(), StoreError> {
        let store = Arc::new(store());
        let (session, _) = store.get_or_create(None).await?;

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = store.clone();
            let id = session.id.clone();
            handles.push(tokio::spawn(async move {
                update_session(store.as_ref(), &id, |s| {
                    s.did = Some(format!("{}x", s.did.clone().unwrap_or_default()));
                    true
                })
                .await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await, Ok(Ok(_))));
        }

        let current = store.get(&session.id).await?.ok_or(StoreError::NotFound)?;
        assert_eq!(current.did.as_ref().map(|did| did.len()), Some(64));
        assert_eq!(current.version(), 64);
        Ok(())
    }

    #[tokio::test]
    async fn update_on_expired_session_is_not_found() -> Result<(), StoreError> {
        let store = InMemorySessionStore::new(Duration::ZERO);
        let (session, _) = store.get_or_create(None).await?;
        let result = update_session(&store, &session.id, |s| s.authorize(None)).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
        Ok(())
    }

    // Store without in-place updates, exercising the compare-and-set loop.
    struct CasStore(InMemorySessionStore);

    #[async_trait]
    impl SessionStore for CasStore {
        async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
            self.0.get(id).await
        }

        async fn get_or_create(&self, id: Option<&str>) -> Result<(Session, bool), StoreError> {
            self.0.get_or_create(id).await
        }

        async fn save(&self, session: &Session) -> Result<Session, StoreError> {
            self.0.save(session).await
        }

        async fn destroy(&self, id: &str) -> Result<bool, StoreError> {
            self.0.destroy(id).await
        }

        async fn purge_expired(&self) -> Result<usize, StoreError> {
            self.0.purge_expired().await
        }
    }

    #[tokio::test]
    async fn default_update_uses_compare_and_set() -> Result<(), StoreError> {
        let store = CasStore(store());
        let (session, _) = store.get_or_create(None).await?;

        let updated = update_session(&store, &session.id, Session::issue_challenge).await?;
        assert_eq!(updated.state, SessionState::ChallengeIssued);
        assert_eq!(updated.version(), session.version() + 1);

        let unchanged = update_session(&store, &session.id, Session::issue_challenge).await?;
        assert_eq!(unchanged.version(), updated.version());

        assert!(store.destroy(&session.id).await?);
        let result = update_session(&store, &session.id, |s| s.authorize(None)).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
        Ok(())
    }
}
