use crate::{
    api::{self, guard::CorsConfig, state::GatewayConfig, verifier::HttpVerifier},
    cli::telemetry,
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub public_url: Url,
    pub verifier_url: Url,
    pub verifier_timeout: u64,
    pub session_ttl: u64,
    pub pending_ttl: u64,
    pub allow_origin: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the verifier client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let verifier = HttpVerifier::new(
        &args.verifier_url,
        Duration::from_secs(args.verifier_timeout),
    )?;

    let config = GatewayConfig::new(args.public_url)
        .with_session_ttl_seconds(args.session_ttl)
        .with_pending_session_ttl_seconds(args.pending_ttl)
        .with_cors(CorsConfig::default().with_allow_origin(args.allow_origin));

    let result = api::new(args.port, config, Arc::new(verifier)).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("public_url", args.public_url.to_string()),
        ("verifier_url", redact_url(&args.verifier_url)),
        ("verifier_timeout", format!("{}s", args.verifier_timeout)),
        ("session_ttl", format!("{}s", args.session_ttl)),
        ("pending_ttl", format!("{}s", args.pending_ttl)),
        ("allow_origin", args.allow_origin.clone()),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_url(url: &Url) -> String {
    let mut url = url.clone();
    if url.password().is_some() {
        let _ = url.set_password(Some("REDACTED"));
    }
    url.to_string()
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    BANNER.replace(
        "{VERSION}",
        &format!(
            " - {} - {}",
            env!("CARGO_PKG_VERSION"),
            short_commit(crate::GIT_COMMIT_HASH)
        ),
    )
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

const BANNER: &str = r"
    .---.
   / .-. \
   | | | |
  _| |_| |_
 |  .---.  |
 |  | o |  |   D I D G A T E {VERSION}
 |  '---'  |
 '---------'";
