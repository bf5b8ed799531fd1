use crate::cli::actions::{cipher, server, Action};
use anyhow::Result;

/// Single dispatch point for every CLI action.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Server(args) => server::execute(args).await,
        Action::Encrypt(args) => {
            cipher::encrypt(&args);
            Ok(())
        }
        Action::Decrypt(args) => cipher::decrypt(&args),
    }
}
