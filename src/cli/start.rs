use crate::cli::{
    actions::Action,
    commands::{self, logging},
    dispatch, telemetry,
};
use anyhow::Result;

/// Parse the command line, start logging and pick the action to run.
///
/// # Errors
///
/// Returns an error if telemetry cannot be initialized or the arguments do not
/// describe a valid action.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(logging::level(&matches))?;

    dispatch::handler(&matches)
}
