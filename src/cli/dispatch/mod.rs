use crate::cli::{
    actions::{database::DatabaseArgs, server, users, Action},
    commands::{self, database},
};
use anyhow::{anyhow, Result};
use clap::ArgMatches;

fn database_args(matches: &ArgMatches) -> Result<DatabaseArgs> {
    let options = database::Options::parse(matches)?;
    Ok(DatabaseArgs {
        dsn: options.dsn,
        password: options.password,
    })
}

/// Translate parsed arguments into an [`Action`].
///
/// # Errors
/// Returns an error if a required argument is missing or the subcommand is unknown.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((commands::server::CMD_SERVER, sub)) => {
            let options = commands::server::Options::parse(sub)?;
            Ok(Action::Server(server::Args {
                port: options.port,
                database: database_args(sub)?,
                session_ttl_seconds: options.session_ttl_seconds,
                session_cookie_secure: options.session_cookie_secure,
                otp_issuer: options.otp_issuer,
                otp_throttle_factor: options.otp_throttle_factor,
            }))
        }
        Some((commands::users::CMD_CREATE_SUPERUSER, sub)) => {
            let options = commands::users::SuperuserOptions::parse(sub)?;
            Ok(Action::CreateSuperuser(users::SuperuserArgs {
                database: database_args(sub)?,
                email: options.email,
                password: options.password,
                first_name: options.first_name,
                last_name: options.last_name,
            }))
        }
        Some((commands::users::CMD_ADD_DEVICE, sub)) => {
            let options = commands::users::DeviceOptions::parse(sub)?;
            Ok(Action::AddDevice(users::DeviceArgs {
                database: database_args(sub)?,
                email: options.email,
                name: options.name,
                issuer: options.issuer,
            }))
        }
        Some((other, _)) => Err(anyhow!("unknown subcommand: {other}")),
        None => Err(anyhow!("missing subcommand")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("ADMIN_OTP_DSN", Some("postgres://user@localhost:5432/admin_otp")),
                ("ADMIN_OTP_DB_PASSWORD", Some("secret")),
                ("ADMIN_OTP_PORT", Some("9090")),
            ],
            || {
                let matches = commands::new().try_get_matches_from(["admin-otp", "server"]).unwrap();
                let Action::Server(args) = handler(&matches).unwrap() else {
                    panic!("expected server action");
                };
                assert_eq!(args.port, 9090);
                assert_eq!(args.database.dsn, "postgres://user@localhost:5432/admin_otp");
                assert_eq!(
                    args.database.password.as_ref().map(|p| p.expose_secret().to_string()),
                    Some("secret".to_string())
                );
                assert_eq!(args.session_ttl_seconds, 43_200);
                assert_eq!(args.otp_throttle_factor, 1);
            },
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn missing_dsn_is_an_error() {
        temp_env::with_vars(
            [
                ("ADMIN_OTP_DSN", None::<&str>),
                ("ADMIN_OTP_DB_PASSWORD", None),
            ],
            || {
                let matches = commands::new().try_get_matches_from(["admin-otp", "server"]).unwrap();
                let err = handler(&matches).err().map(|e| e.to_string());
                assert_eq!(err.as_deref(), Some("missing required argument: --dsn"));
            },
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn create_superuser_action() {
        temp_env::with_vars(
            [
                ("ADMIN_OTP_DSN", None::<&str>),
                ("ADMIN_OTP_SUPERUSER_PASSWORD", Some("hunter2")),
            ],
            || {
                let matches = commands::new()
                    .try_get_matches_from([
                        "admin-otp",
                        "create-superuser",
                        "--dsn",
                        "postgres://localhost/admin_otp",
                        "--email",
                        "root@example.com",
                        "--first-name",
                        "Ada",
                    ])
                    .unwrap();
                let Action::CreateSuperuser(args) = handler(&matches).unwrap() else {
                    panic!("expected create-superuser action");
                };
                assert_eq!(args.email, "root@example.com");
                assert_eq!(args.password.expose_secret(), "hunter2");
                assert_eq!(args.first_name, "Ada");
                assert_eq!(args.last_name, "");
            },
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn add_device_action_defaults_name() {
        temp_env::with_vars(
            [
                ("ADMIN_OTP_DSN", Some("postgres://localhost/admin_otp")),
                ("ADMIN_OTP_OTP_ISSUER", None),
            ],
            || {
                let matches = commands::new()
                    .try_get_matches_from(["admin-otp", "add-device", "--email", "root@example.com"])
                    .unwrap();
                let Action::AddDevice(args) = handler(&matches).unwrap() else {
                    panic!("expected add-device action");
                };
                assert_eq!(args.email, "root@example.com");
                assert_eq!(args.name, "default");
                assert_eq!(args.issuer, "Admin OTP");
            },
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn add_device_shares_the_server_issuer() {
        temp_env::with_vars(
            [
                ("ADMIN_OTP_DSN", Some("postgres://localhost/admin_otp")),
                ("ADMIN_OTP_OTP_ISSUER", Some("Example Corp")),
            ],
            || {
                let matches = commands::new()
                    .try_get_matches_from(["admin-otp", "add-device", "--email", "root@example.com"])
                    .unwrap();
                let Action::AddDevice(args) = handler(&matches).unwrap() else {
                    panic!("expected add-device action");
                };
                assert_eq!(args.issuer, "Example Corp");

                let matches = commands::new()
                    .try_get_matches_from(["admin-otp", "server"])
                    .unwrap();
                let Action::Server(server) = handler(&matches).unwrap() else {
                    panic!("expected server action");
                };
                assert_eq!(server.otp_issuer, args.issuer);
            },
        );
    }
}
