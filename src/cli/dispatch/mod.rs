use crate::cli::{
    actions::{cipher, server, Action},
    commands::{
        cipher::{ARG_INPUT, ARG_KEY, CMD_DECRYPT, CMD_ENCRYPT},
        gateway::{
            ARG_ALLOW_ORIGIN, ARG_PENDING_TTL, ARG_PORT, ARG_PUBLIC_URL, ARG_SESSION_TTL, ARG_VERIFIER_TIMEOUT,
            ARG_VERIFIER_URL,
        },
    },
};
use anyhow::{Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use url::Url;

/// Turn parsed arguments into an [`Action`]
///
/// # Errors
/// Returns an error if required arguments are missing or a URL is invalid.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_ENCRYPT, sub)) => Ok(Action::Encrypt(cipher_args(sub)?)),
        Some((CMD_DECRYPT, sub)) => Ok(Action::Decrypt(cipher_args(sub)?)),
        _ => Ok(Action::Server(server_args(matches)?)),
    }
}

fn server_args(matches: &ArgMatches) -> Result<server::Args> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let public_url = matches
        .get_one::<String>(ARG_PUBLIC_URL)
        .context("missing required argument: --public-url")?;
    let public_url = Url::parse(public_url).context("invalid DIDGATE_PUBLIC_URL")?;

    let verifier_url = matches
        .get_one::<String>(ARG_VERIFIER_URL)
        .context("missing required argument: --verifier-url")?;
    let verifier_url = Url::parse(verifier_url).context("invalid DIDGATE_VERIFIER_URL")?;

    let verifier_timeout = matches
        .get_one::<u64>(ARG_VERIFIER_TIMEOUT)
        .copied()
        .unwrap_or(crate::api::verifier::DEFAULT_VERIFIER_TIMEOUT_SECONDS);

    let session_ttl = matches
        .get_one::<u64>(ARG_SESSION_TTL)
        .copied()
        .unwrap_or(crate::api::session::DEFAULT_SESSION_TTL_SECONDS);

    let pending_ttl = matches
        .get_one::<u64>(ARG_PENDING_TTL)
        .copied()
        .unwrap_or(crate::api::session::DEFAULT_PENDING_SESSION_TTL_SECONDS);

    let allow_origin = matches
        .get_one::<String>(ARG_ALLOW_ORIGIN)
        .cloned()
        .unwrap_or_else(|| crate::api::guard::DEFAULT_ALLOW_ORIGIN.to_string());

    Ok(server::Args {
        port,
        public_url,
        verifier_url,
        verifier_timeout,
        session_ttl,
        pending_ttl,
        allow_origin,
    })
}

fn cipher_args(matches: &ArgMatches) -> Result<cipher::Args> {
    let key = matches
        .get_one::<String>(ARG_KEY)
        .cloned()
        .context("missing required argument: --key")?;

    let input = matches
        .get_one::<String>(ARG_INPUT)
        .cloned()
        .context("missing required argument: <input>")?;

    Ok(cipher::Args {
        key: SecretString::from(key),
        input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    fn clean_env<F: FnOnce()>(f: F) {
        temp_env::with_vars(
            [
                ("DIDGATE_PORT", None::<&str>),
                ("DIDGATE_PUBLIC_URL", None),
                ("DIDGATE_VERIFIER_URL", None),
                ("DIDGATE_VERIFIER_TIMEOUT", None),
                ("DIDGATE_SESSION_TTL", None),
                ("DIDGATE_PENDING_TTL", None),
                ("DIDGATE_ALLOW_ORIGIN", None),
                ("DIDGATE_AES_KEY", None),
            ],
            f,
        );
    }

    #[test]
    fn server_action_from_defaults() {
        clean_env(|| {
            let matches = commands::new().get_matches_from(vec![
                "didgate",
                "--verifier-url",
                "http://verifier.tld:8081",
            ]);

            let Ok(Action::Server(args)) = handler(&matches) else {
                panic!("expected server action");
            };
            assert_eq!(args.port, 8080);
            assert_eq!(args.public_url.as_str(), "http://localhost:8080/");
            assert_eq!(args.verifier_url.as_str(), "http://verifier.tld:8081/");
            assert_eq!(args.verifier_timeout, 10);
            assert_eq!(args.session_ttl, 43200);
            assert_eq!(args.pending_ttl, 600);
            assert_eq!(args.allow_origin, "*");
        });
    }

    #[test]
    fn invalid_verifier_url_is_rejected() {
        clean_env(|| {
            let matches =
                commands::new().get_matches_from(vec!["didgate", "--verifier-url", "not a url"]);
            assert!(handler(&matches).is_err());
        });
    }

    #[test]
    fn encrypt_action() {
        clean_env(|| {
            let matches = commands::new().get_matches_from(vec![
                "didgate", "encrypt", "--key", "hello", "dmyz.org",
            ]);

            let Ok(Action::Encrypt(args)) = handler(&matches) else {
                panic!("expected encrypt action");
            };
            assert_eq!(args.key.expose_secret(), "hello");
            assert_eq!(args.input, "dmyz.org");
        });
    }

    #[test]
    fn decrypt_action() {
        clean_env(|| {
            let matches = commands::new().get_matches_from(vec![
                "didgate",
                "decrypt",
                "-k",
                "hello",
                "fdc9769dc539780fdd6d5d3b3f11151a",
            ]);

            assert!(matches!(handler(&matches), Ok(Action::Decrypt(_))));
        });
    }
}
