//! Second-factor verification bound to an already authenticated user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{device::TotpDevice, error::OtpError, store::DeviceStore};
use crate::users::User;

const DEFAULT_ISSUER: &str = "Admin OTP";
const DEFAULT_THROTTLE_FACTOR: u32 = 1;

#[derive(Clone, Debug)]
pub struct OtpConfig {
    issuer: String,
    throttle_factor: u32,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            throttle_factor: DEFAULT_THROTTLE_FACTOR,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    /// Base delay in seconds for failure back-off; 0 disables throttling.
    #[must_use]
    pub fn with_throttle_factor(mut self, factor: u32) -> Self {
        self.throttle_factor = factor;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn throttle_factor(&self) -> u32 {
        self.throttle_factor
    }
}

#[async_trait]
pub trait OtpVerifier: Send + Sync {
    /// Verify `token` for `user`, optionally against one chosen device.
    /// Returns the device that accepted the token.
    async fn verify(
        &self,
        user: &User,
        device_id: Option<Uuid>,
        token: &str,
    ) -> Result<TotpDevice, OtpError>;
}

pub struct TotpVerifier {
    devices: Arc<dyn DeviceStore>,
    config: OtpConfig,
}

impl TotpVerifier {
    #[must_use]
    pub fn new(devices: Arc<dyn DeviceStore>, config: OtpConfig) -> Self {
        Self { devices, config }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    async fn candidates(
        &self,
        user: &User,
        device_id: Option<Uuid>,
    ) -> Result<Vec<TotpDevice>, OtpError> {
        match device_id {
            Some(id) => Ok(self
                .devices
                .get(id)
                .await?
                .filter(|device| device.user_id == user.id && device.confirmed)
                .into_iter()
                .collect()),
            None => Ok(self.devices.devices_for_user(user.id, true).await?),
        }
    }

    /// Verification against an explicit clock.
    ///
    /// # Errors
    /// See [`OtpError`].
    pub async fn verify_at(
        &self,
        user: &User,
        device_id: Option<Uuid>,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TotpDevice, OtpError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(OtpError::TokenRequired);
        }

        let candidates = self.candidates(user, device_id).await?;
        let checked = candidates.len();
        let mut throttled = 0_usize;
        let mut max_failures = 0_u32;

        for mut device in candidates {
            if let Err(OtpError::Throttled { failures }) =
                device.verify_is_allowed(now, self.config.throttle_factor)
            {
                debug!(device_id = %device.id, failures, "Device throttled");
                throttled += 1;
                max_failures = max_failures.max(failures);
                continue;
            }

            if device.match_token(token, now)? {
                if self.devices.record_success(&device).await? {
                    device.throttle_reset();
                    info!(user_id = %user.id, device_id = %device.id, "OTP verified");
                    return Ok(device);
                }
                warn!(user_id = %user.id, device_id = %device.id, "OTP step already used");
            }

            self.devices.record_failure(device.id, now).await?;
        }

        warn!(user_id = %user.id, devices = checked, "OTP verification failed");

        // Throttling is only reported when no candidate could be checked at all.
        if checked > 0 && throttled == checked {
            return Err(OtpError::Throttled {
                failures: max_failures,
            });
        }
        Err(OtpError::InvalidToken)
    }
}

#[async_trait]
impl OtpVerifier for TotpVerifier {
    async fn verify(
        &self,
        user: &User,
        device_id: Option<Uuid>,
        token: &str,
    ) -> Result<TotpDevice, OtpError> {
        self.verify_at(user, device_id, token, Utc::now()).await
    }
}
