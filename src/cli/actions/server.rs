use crate::api::{self, SiteConfig};
use crate::cli::actions::database::DatabaseArgs;
use crate::cli::telemetry;
use crate::otp::OtpConfig;
use anyhow::Result;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub database: DatabaseArgs,
    pub session_ttl_seconds: i64,
    pub session_cookie_secure: bool,
    pub otp_issuer: String,
    pub otp_throttle_factor: u32,
}

impl Args {
    #[must_use]
    pub fn site_config(&self) -> SiteConfig {
        SiteConfig::new()
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_session_cookie_secure(self.session_cookie_secure)
            .with_otp(
                OtpConfig::new()
                    .with_issuer(self.otp_issuer.clone())
                    .with_throttle_factor(self.otp_throttle_factor),
            )
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        port = args.port,
        session_ttl_seconds = args.session_ttl_seconds,
        otp_throttle_factor = args.otp_throttle_factor,
        "Starting admin server"
    );
    let config = args.site_config();
    let result = api::new(args.port, args.database.url()?, config).await;
    telemetry::shutdown_tracer();
    result
}
