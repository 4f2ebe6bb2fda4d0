use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use super::server::{otp_issuer_arg, ARG_OTP_ISSUER};

pub const CMD_CREATE_SUPERUSER: &str = "create-superuser";
pub const CMD_ADD_DEVICE: &str = "add-device";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_FIRST_NAME: &str = "first-name";
pub const ARG_LAST_NAME: &str = "last-name";
pub const ARG_DEVICE_NAME: &str = "name";

#[must_use]
pub fn create_superuser_command() -> Command {
    Command::new(CMD_CREATE_SUPERUSER)
        .about("Create a staff superuser")
        .arg(
            Arg::new(ARG_EMAIL)
                .long(ARG_EMAIL)
                .help("Login email")
                .required(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Password")
                .env("ADMIN_OTP_SUPERUSER_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_FIRST_NAME)
                .long(ARG_FIRST_NAME)
                .default_value(""),
        )
        .arg(
            Arg::new(ARG_LAST_NAME)
                .long(ARG_LAST_NAME)
                .default_value(""),
        )
}

#[must_use]
pub fn add_device_command() -> Command {
    Command::new(CMD_ADD_DEVICE)
        .about("Enroll a TOTP device and print its provisioning URL")
        .arg(
            Arg::new(ARG_EMAIL)
                .long(ARG_EMAIL)
                .help("Owner email")
                .required(true),
        )
        .arg(
            Arg::new(ARG_DEVICE_NAME)
                .long(ARG_DEVICE_NAME)
                .help("Device name")
                .default_value("default"),
        )
        .arg(otp_issuer_arg())
}

#[derive(Debug)]
pub struct SuperuserOptions {
    pub email: String,
    pub password: SecretString,
    pub first_name: String,
    pub last_name: String,
}

impl SuperuserOptions {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let email = matches
            .get_one::<String>(ARG_EMAIL)
            .cloned()
            .context("missing required argument: --email")?;
        let password = matches
            .get_one::<String>(ARG_PASSWORD)
            .map(|password| SecretString::from(password.clone()))
            .context("missing required argument: --password")?;
        Ok(Self {
            email,
            password,
            first_name: matches
                .get_one::<String>(ARG_FIRST_NAME)
                .cloned()
                .unwrap_or_default(),
            last_name: matches
                .get_one::<String>(ARG_LAST_NAME)
                .cloned()
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug)]
pub struct DeviceOptions {
    pub email: String,
    pub name: String,
    pub issuer: String,
}

impl DeviceOptions {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            email: matches
                .get_one::<String>(ARG_EMAIL)
                .cloned()
                .context("missing required argument: --email")?,
            name: matches
                .get_one::<String>(ARG_DEVICE_NAME)
                .cloned()
                .unwrap_or_else(|| "default".to_string()),
            issuer: matches
                .get_one::<String>(ARG_OTP_ISSUER)
                .cloned()
                .unwrap_or_else(|| "Admin OTP".to_string()),
        })
    }
}
