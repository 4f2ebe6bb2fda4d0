use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

use crate::api::state::MAX_SESSION_TTL_SECONDS;

pub const CMD_SERVER: &str = "server";
pub const ARG_PORT: &str = "port";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_COOKIE_SECURE: &str = "session-cookie-secure";
pub const ARG_OTP_ISSUER: &str = "otp-issuer";
pub const ARG_OTP_THROTTLE_FACTOR: &str = "otp-throttle-factor";

/// Shared by every command that renders provisioning URLs.
#[must_use]
pub fn otp_issuer_arg() -> Arg {
    Arg::new(ARG_OTP_ISSUER)
        .long(ARG_OTP_ISSUER)
        .help("Issuer shown by authenticator apps")
        .env("ADMIN_OTP_OTP_ISSUER")
        .default_value("Admin OTP")
}

#[must_use]
pub fn command() -> Command {
    Command::new(CMD_SERVER)
        .about("Serve the OTP-gated admin")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("ADMIN_OTP_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Admin session TTL in seconds")
                .env("ADMIN_OTP_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_SECURE)
                .long(ARG_SESSION_COOKIE_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("ADMIN_OTP_SESSION_COOKIE_SECURE")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(otp_issuer_arg())
        .arg(
            Arg::new(ARG_OTP_THROTTLE_FACTOR)
                .long(ARG_OTP_THROTTLE_FACTOR)
                .help("Base delay in seconds after a failed OTP attempt, 0 disables throttling")
                .env("ADMIN_OTP_OTP_THROTTLE_FACTOR")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub otp_issuer: String,
    pub otp_throttle_factor: u32,
}

impl Options {
    /// # Errors
    /// Never fails for matches produced by [`command`]; kept fallible like the other option groups.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(43_200),
            session_cookie_secure: matches.get_flag(ARG_SESSION_COOKIE_SECURE),
            otp_issuer: matches
                .get_one::<String>(ARG_OTP_ISSUER)
                .cloned()
                .unwrap_or_else(|| "Admin OTP".to_string()),
            otp_throttle_factor: matches
                .get_one::<u32>(ARG_OTP_THROTTLE_FACTOR)
                .copied()
                .unwrap_or(1),
        })
    }
}
