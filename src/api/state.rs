//! Shared state for admin handlers and the site configuration.

use chrono::Duration;
use sqlx::PgPool;
use std::{fmt, sync::Arc};

use crate::admin::{AdminSite, AdminSites, AdminStores, SessionStore};
use crate::otp::{OtpConfig, OtpVerifier, TotpVerifier};

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
/// One year.
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct SiteConfig {
    session_ttl_seconds: i64,
    session_cookie_secure: bool,
    otp: OtpConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_secure: false,
            otp: OtpConfig::new(),
        }
    }

    /// Clamped to `1..=MAX_SESSION_TTL_SECONDS`.
    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds.clamp(1, MAX_SESSION_TTL_SECONDS);
        self
    }

    /// Mark the session cookie `Secure`; enable when served over HTTPS.
    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_otp(mut self, otp: OtpConfig) -> Self {
        self.otp = otp;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn otp(&self) -> &OtpConfig {
        &self.otp
    }
}

/// Everything a request handler needs, shared through an `Extension`.
pub struct AdminState {
    sites: AdminSites,
    stores: AdminStores,
    sessions: Arc<dyn SessionStore>,
    verifier: Arc<dyn OtpVerifier>,
    config: SiteConfig,
    pool: Option<PgPool>,
}

impl fmt::Debug for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminState")
            .field("site", &self.sites.gated.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AdminState {
    /// State with a TOTP verifier over `stores.devices`.
    #[must_use]
    pub fn new(
        sites: AdminSites,
        stores: AdminStores,
        sessions: Arc<dyn SessionStore>,
        config: SiteConfig,
    ) -> Self {
        let verifier = Arc::new(TotpVerifier::new(
            Arc::clone(&stores.devices),
            config.otp().clone(),
        ));
        Self {
            sites,
            stores,
            sessions,
            verifier,
            config,
            pool: None,
        }
    }

    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn OtpVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Database pool checked by `/health`.
    #[must_use]
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn sites(&self) -> &AdminSites {
        &self.sites
    }

    /// The OTP-gated site every `/admin/` route is served from.
    #[must_use]
    pub fn site(&self) -> &AdminSite {
        &self.sites.gated
    }

    #[must_use]
    pub fn stores(&self) -> &AdminStores {
        &self.stores
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn verifier(&self) -> &dyn OtpVerifier {
        self.verifier.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_builders() {
        let config = SiteConfig::new();
        assert_eq!(config.session_ttl_seconds(), 43_200);
        assert!(!config.session_cookie_secure());
        assert_eq!(config.otp().issuer(), "Admin OTP");

        let config = SiteConfig::new()
            .with_session_ttl_seconds(60)
            .with_session_cookie_secure(true)
            .with_otp(OtpConfig::new().with_issuer("Example".to_string()));
        assert_eq!(config.session_ttl(), Duration::seconds(60));
        assert!(config.session_cookie_secure());
        assert_eq!(config.otp().issuer(), "Example");
    }

    #[test]
    fn session_ttl_is_bounded() {
        let config = SiteConfig::new().with_session_ttl_seconds(i64::MAX);
        assert_eq!(config.session_ttl_seconds(), MAX_SESSION_TTL_SECONDS);
        assert_eq!(config.session_ttl(), Duration::seconds(MAX_SESSION_TTL_SECONDS));

        let config = SiteConfig::new().with_session_ttl_seconds(0);
        assert_eq!(config.session_ttl_seconds(), 1);
    }
}
