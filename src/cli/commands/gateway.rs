use clap::{Arg, Command};

pub const ARG_PORT: &str = "port";
pub const ARG_PUBLIC_URL: &str = "public-url";
pub const ARG_VERIFIER_URL: &str = "verifier-url";
pub const ARG_VERIFIER_TIMEOUT: &str = "verifier-timeout";
pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_PENDING_TTL: &str = "pending-ttl";
pub const ARG_ALLOW_ORIGIN: &str = "allow-origin";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("DIDGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_PUBLIC_URL)
                .long(ARG_PUBLIC_URL)
                .help("Public base URL of this gateway, used to build the challenge callback")
                .default_value("http://localhost:8080")
                .env("DIDGATE_PUBLIC_URL"),
        )
        .arg(
            Arg::new(ARG_VERIFIER_URL)
                .long(ARG_VERIFIER_URL)
                .help("Base URL of the signature verifier, example: http://verifier.tld:8081")
                .env("DIDGATE_VERIFIER_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_VERIFIER_TIMEOUT)
                .long(ARG_VERIFIER_TIMEOUT)
                .help("Seconds to wait for the verifier before failing the sign-in")
                .default_value("10")
                .env("DIDGATE_VERIFIER_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session lifetime in seconds")
                .default_value("43200")
                .env("DIDGATE_SESSION_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_PENDING_TTL)
                .long(ARG_PENDING_TTL)
                .help("Seconds a session may stay unauthorized before it expires")
                .default_value("600")
                .env("DIDGATE_PENDING_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_ALLOW_ORIGIN)
                .long(ARG_ALLOW_ORIGIN)
                .help("Value of the Access-Control-Allow-Origin response header")
                .default_value("*")
                .env("DIDGATE_ALLOW_ORIGIN"),
        )
}
