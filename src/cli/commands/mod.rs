pub mod database;
pub mod logging;
pub mod server;
pub mod users;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("admin-otp")
        .about("OTP-gated administration for privileged accounts")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(server::command())
        .subcommand(users::create_superuser_command())
        .subcommand(users::add_device_command());

    let command = database::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DSN: &str = "postgres://admin@localhost:5432/admin_otp";

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "admin-otp");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("OTP-gated administration for privileged accounts".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_check_port_and_dsn() {
        temp_env::with_vars(
            [
                ("ADMIN_OTP_DSN", None::<&str>),
                ("ADMIN_OTP_PORT", None::<&str>),
            ],
            || {
                let matches = new().get_matches_from(vec![
                    "admin-otp", "--dsn", DSN, "server", "--port", "9090",
                ]);
                assert_eq!(
                    matches.get_one::<String>(database::ARG_DSN).cloned(),
                    Some(DSN.to_string())
                );
                let Some((name, sub)) = matches.subcommand() else {
                    panic!("expected subcommand");
                };
                assert_eq!(name, server::CMD_SERVER);
                assert_eq!(sub.get_one::<u16>(server::ARG_PORT).copied(), Some(9090));
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("ADMIN_OTP_DSN", Some(DSN)),
                ("ADMIN_OTP_PORT", Some("443")),
                ("ADMIN_OTP_SESSION_TTL_SECONDS", Some("600")),
                ("ADMIN_OTP_SESSION_COOKIE_SECURE", Some("true")),
                ("ADMIN_OTP_OTP_THROTTLE_FACTOR", Some("0")),
                ("ADMIN_OTP_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["admin-otp", "server"]);
                assert_eq!(
                    matches.get_one::<String>(database::ARG_DSN).cloned(),
                    Some(DSN.to_string())
                );
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
                let Some((_, sub)) = matches.subcommand() else {
                    panic!("expected subcommand");
                };
                let options = server::Options::parse(sub);
                let Ok(options) = options else {
                    panic!("expected server options");
                };
                assert_eq!(options.port, 443);
                assert_eq!(options.session_ttl_seconds, 600);
                assert!(options.session_cookie_secure);
                assert_eq!(options.otp_throttle_factor, 0);
                assert_eq!(options.otp_issuer, "Admin OTP");
            },
        );
    }

    #[test]
    fn session_ttl_above_one_year_is_rejected() {
        temp_env::with_vars([("ADMIN_OTP_DSN", Some(DSN))], || {
            let accepted = new().try_get_matches_from(vec![
                "admin-otp",
                "server",
                "--session-ttl-seconds",
                "31536000",
            ]);
            assert!(accepted.is_ok());

            let rejected = new().try_get_matches_from(vec![
                "admin-otp",
                "server",
                "--session-ttl-seconds",
                "31536001",
            ]);
            assert!(rejected.is_err());

            let huge = new().try_get_matches_from(vec![
                "admin-otp",
                "server",
                "--session-ttl-seconds",
                "9223372036854775807",
            ]);
            assert!(huge.is_err());
        });
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(
                [("ADMIN_OTP_LOG_LEVEL", Some(level)), ("ADMIN_OTP_DSN", Some(DSN))],
                || {
                    let matches = new().get_matches_from(vec!["admin-otp", "server"]);
                    assert_eq!(
                        matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                        u8::try_from(index).ok()
                    );
                },
            );
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5_usize {
            temp_env::with_vars([("ADMIN_OTP_LOG_LEVEL", None::<String>)], || {
                let mut args = vec!["admin-otp".to_string()];
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }
                args.push("server".to_string());

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_create_superuser_args() {
        temp_env::with_vars([("ADMIN_OTP_SUPERUSER_PASSWORD", Some("s3cret"))], || {
            let matches = new().get_matches_from(vec![
                "admin-otp",
                "create-superuser",
                "--email",
                "root@example.com",
                "--first-name",
                "Ada",
            ]);
            let Some((name, sub)) = matches.subcommand() else {
                panic!("expected subcommand");
            };
            assert_eq!(name, users::CMD_CREATE_SUPERUSER);
            let Ok(options) = users::SuperuserOptions::parse(sub) else {
                panic!("expected superuser options");
            };
            assert_eq!(options.email, "root@example.com");
            assert_eq!(options.first_name, "Ada");
            assert_eq!(options.last_name, "");
            assert_eq!(secrecy::ExposeSecret::expose_secret(&options.password), "s3cret");
        });
    }

    #[test]
    fn test_missing_subcommand_is_an_error() {
        assert!(new().try_get_matches_from(vec!["admin-otp"]).is_err());
    }
}
