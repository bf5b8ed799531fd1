use clap::{Arg, Command};

pub const CMD_ENCRYPT: &str = "encrypt";
pub const CMD_DECRYPT: &str = "decrypt";
pub const ARG_KEY: &str = "key";
pub const ARG_INPUT: &str = "input";

fn key_arg() -> Arg {
    Arg::new(ARG_KEY)
        .short('k')
        .long(ARG_KEY)
        .help("AES key of any length, zero padded or truncated to 32 bytes")
        .env("DIDGATE_AES_KEY")
        .hide_env_values(true)
        .required(true)
}

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(
            Command::new(CMD_ENCRYPT)
                .about("Encrypt plaintext with AES-256-CBC and print lowercase hex")
                .arg(key_arg())
                .arg(
                    Arg::new(ARG_INPUT)
                        .help("Plaintext to encrypt")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new(CMD_DECRYPT)
                .about("Decrypt a hex ciphertext produced by `encrypt`")
                .arg(key_arg())
                .arg(
                    Arg::new(ARG_INPUT)
                        .help("Hex encoded ciphertext")
                        .required(true),
                ),
        )
}
