//! Client for the external signature verifier.
//!
//! The gateway never checks signatures itself. It forwards the opaque `sign`
//! value to `{verifier}/verify` and trusts the boolean verdict.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_VERIFIER_TIMEOUT_SECONDS: u64 = 10;

/// Verdict returned by the verifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verifier request failed: {0}")]
    Transport(String),
    #[error("verifier request timed out")]
    Timeout,
    #[error("verifier responded with status {0}")]
    Status(u16),
    #[error("malformed verifier response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, sign: &Value) -> Result<Verdict, VerifyError>;
}

#[derive(Serialize)]
struct SignRequest<'a> {
    sign: &'a Value,
}

/// [`Verifier`] backed by the verifier's HTTP API.
#[derive(Clone, Debug)]
pub struct HttpVerifier {
    client: Client,
    verify_url: Url,
}

impl HttpVerifier {
    /// # Errors
    /// Returns an error if the verify URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &Url, timeout: Duration) -> anyhow::Result<Self> {
        let verify_url = Url::parse(&format!(
            "{}/verify",
            base_url.as_str().trim_end_matches('/')
        ))?;

        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self { client, verify_url })
    }

    #[must_use]
    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }
}

#[async_trait]
impl Verifier for HttpVerifier {
    #[instrument(skip(self, sign), fields(url = %self.verify_url))]
    async fn verify(&self, sign: &Value) -> Result<Verdict, VerifyError> {
        let response = self
            .client
            .post(self.verify_url.clone())
            .json(&SignRequest { sign })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::Status(status.as_u16()));
        }

        let verdict = response.json::<Verdict>().await.map_err(|err| {
            if err.is_timeout() {
                VerifyError::Timeout
            } else {
                VerifyError::Malformed(err.to_string())
            }
        })?;

        debug!("Verifier verdict: {}", verdict.result);

        Ok(verdict)
    }
}

fn transport_error(err: reqwest::Error) -> VerifyError {
    if err.is_timeout() {
        VerifyError::Timeout
    } else {
        VerifyError::Transport(err.to_string())
    }
}
