use clap::{builder::ValueParser, Arg, ArgAction, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

// Index is the `-v` count; `DIDGATE_LOG_LEVEL` accepts the name or the index.
const LEVELS: [(&str, Level); 5] = [
    ("error", Level::ERROR),
    ("warn", Level::WARN),
    ("info", Level::INFO),
    ("debug", Level::DEBUG),
    ("trace", Level::TRACE),
];

fn parse_level(value: &str) -> Result<u8, String> {
    let index = match value.parse::<usize>() {
        Ok(index) => Some(index).filter(|i| *i < LEVELS.len()),
        Err(_) => LEVELS
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(value.trim())),
    };

    index
        .and_then(|i| u8::try_from(i).ok())
        .ok_or_else(|| {
            format!("invalid log level '{value}', expected error|warn|info|debug|trace or 0-4")
        })
}

/// Tracing level selected by `-v` flags or `DIDGATE_LOG_LEVEL`, `ERROR` when unset.
#[must_use]
pub fn level(matches: &ArgMatches) -> Level {
    let count = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
    let index = usize::from(count).min(LEVELS.len() - 1);
    LEVELS[index].1
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log level, repeat to raise it: -v warn, -vv info, -vvv debug, -vvvv trace (default: error)")
            .env("DIDGATE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(ValueParser::from(parse_level)),
    )
}
