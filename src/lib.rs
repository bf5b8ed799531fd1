//! # didgate
//!
//! `didgate` is a session-gated sign-in gateway for decentralized identifiers.
//!
//! A browser first gets a session cookie and a challenge from `GET /login`. The
//! challenge nonce is the session id, so the signature the wallet produces is
//! bound to that one session. The signature is posted to `POST /verify`, which
//! forwards it to an external verifier and, on a positive verdict, marks the
//! session authorized. Every path outside a small allow-list answers `401`
//! until that happens.
//!
//! The crate also ships the [`cipher`] helper used to produce AES-256-CBC
//! ciphertexts compatible with the rest of the platform.

pub mod api;
pub mod cipher;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
