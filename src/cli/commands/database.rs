use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_PASSWORD: &str = "db-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("ADMIN_OTP_DSN")
                .global(true),
        )
        .arg(
            Arg::new(ARG_DB_PASSWORD)
                .long(ARG_DB_PASSWORD)
                .help("Database password, replaces the one in the DSN")
                .env("ADMIN_OTP_DB_PASSWORD")
                .hide_env_values(true)
                .global(true),
        )
}

#[derive(Debug)]
pub struct Options {
    pub dsn: String,
    pub password: Option<SecretString>,
}

impl Options {
    /// # Errors
    /// Returns an error if `--dsn` is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .cloned()
            .context("missing required argument: --dsn")?;
        let password = matches
            .get_one::<String>(ARG_DB_PASSWORD)
            .map(|password| SecretString::from(password.clone()));
        Ok(Self { dsn, password })
    }
}
