//! Admin sites: the framework default and the OTP-gated one.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{
    device_admin::{CustomTotpDeviceAdmin, TotpDeviceAdmin, DEVICE_MODEL},
    registry::{Registry, RegistryError},
    user_admin::UserAdmin,
};
use crate::users::User;

pub const DEFAULT_SITE_NAME: &str = "admin";
pub const OTP_SITE_NAME: &str = "OTPAdmin";
pub const OTP_SITE_BRANDING: &str = "Admin OTP";
pub const OTP_LOGIN_TEMPLATE: &str = "admin_custom_login.html";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Branding {
    pub site_header: String,
    pub site_title: String,
    /// `None` hides the "view site" link.
    pub site_url: Option<String>,
    pub index_title: String,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            site_header: "Administration".to_string(),
            site_title: "Site admin".to_string(),
            site_url: Some("/".to_string()),
            index_title: "Site administration".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AdminSite {
    name: String,
    branding: Branding,
    login_template: Option<String>,
    otp_required: bool,
    registry: Registry,
}

impl AdminSite {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            branding: Branding::default(),
            login_template: None,
            otp_required: false,
            registry: Registry::new(),
        }
    }

    /// Site whose login form also requires an OTP token.
    #[must_use]
    pub fn otp_gated(name: &str) -> Self {
        Self {
            name: name.to_string(),
            branding: Branding {
                site_header: OTP_SITE_BRANDING.to_string(),
                site_title: OTP_SITE_BRANDING.to_string(),
                site_url: None,
                index_title: Branding::default().index_title,
            },
            login_template: Some(OTP_LOGIN_TEMPLATE.to_string()),
            otp_required: true,
            registry: Registry::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn branding(&self) -> &Branding {
        &self.branding
    }

    #[must_use]
    pub fn login_template(&self) -> Option<&str> {
        self.login_template.as_deref()
    }

    #[must_use]
    pub fn otp_required(&self) -> bool {
        self.otp_required
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Whether a logged-in user may use this site.
    #[must_use]
    pub fn has_permission(&self, user: &User, otp_verified: bool) -> bool {
        user.is_active && user.is_staff && (otp_verified || !self.otp_required)
    }
}

/// Both sites, built in the order mirroring depends on.
#[derive(Clone, Debug)]
pub struct AdminSites {
    pub default: AdminSite,
    pub gated: AdminSite,
}

impl AdminSites {
    /// 1. default site with the stock OTP registrations,
    /// 2. default site customizations,
    /// 3. gated site mirroring the populated default site.
    ///
    /// # Errors
    /// Returns a [`RegistryError`] if a registration step conflicts.
    pub fn bootstrap() -> Result<Self, RegistryError> {
        let mut default = AdminSite::new(DEFAULT_SITE_NAME);
        default.registry_mut().register(Arc::new(TotpDeviceAdmin))?;

        default.registry_mut().unregister(DEVICE_MODEL)?;
        default
            .registry_mut()
            .register(Arc::new(CustomTotpDeviceAdmin))?;
        default.registry_mut().register(Arc::new(UserAdmin))?;

        let mut gated = AdminSite::otp_gated(OTP_SITE_NAME);
        gated.registry_mut().mirror_from(default.registry())?;
        for (key, _) in gated.registry().iter() {
            debug!(model = %key, site = gated.name(), "Registered model");
        }
        info!(
            site = gated.name(),
            models = gated.registry().len(),
            "Admin sites ready"
        );

        Ok(Self { default, gated })
    }
}
