use crate::cipher;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct Args {
    pub key: SecretString,
    pub input: String,
}

/// Print the lowercase hex ciphertext of `args.input`.
pub fn encrypt(args: &Args) {
    let output = cipher::encrypt_hex(args.input.as_bytes(), args.key.expose_secret().as_bytes());
    println!("{output}");
}

/// Print the plaintext of the hex ciphertext in `args.input`.
/// # Errors
/// Returns an error if the input is not valid hex, has a bad length, or fails to unpad.
pub fn decrypt(args: &Args) -> Result<()> {
    let plaintext = cipher::decrypt_hex(args.input.trim(), args.key.expose_secret().as_bytes())
        .context("Failed to decrypt input")?;
    println!("{}", String::from_utf8_lossy(&plaintext));
    Ok(())
}
