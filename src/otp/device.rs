//! TOTP device record and the per-device verification state machine.
//!
//! A device accepts a token for time step `t` only if `t > last_t`, so a code
//! can never be used twice. The window is `tolerance` steps either side of the
//! current step shifted by `drift`; a match re-centres `drift` on the step that
//! matched. Consecutive failures throttle the device for
//! `2^(n-1) * factor` seconds after the last failure.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Row};
use totp_rs::{Algorithm, Secret, TOTP};
use uuid::Uuid;

use super::error::OtpError;

pub const DEFAULT_STEP: i16 = 30;
pub const DEFAULT_DIGITS: i16 = 6;
pub const DEFAULT_TOLERANCE: i16 = 1;

#[derive(Clone, Debug, Serialize)]
pub struct TotpDevice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub confirmed: bool,
    /// Base32 shared secret.
    #[serde(skip_serializing)]
    pub key: String,
    pub step: i16,
    pub t0: i64,
    pub digits: i16,
    pub tolerance: i16,
    pub drift: i16,
    pub last_t: i64,
    pub throttling_failure_count: i32,
    pub throttling_failure_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for TotpDevice {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            confirmed: row.try_get("confirmed")?,
            key: row.try_get("key")?,
            step: row.try_get("step")?,
            t0: row.try_get("t0")?,
            digits: row.try_get("digits")?,
            tolerance: row.try_get("tolerance")?,
            drift: row.try_get("drift")?,
            last_t: row.try_get("last_t")?,
            throttling_failure_count: row.try_get("throttling_failure_count")?,
            throttling_failure_timestamp: row.try_get("throttling_failure_timestamp")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Fields needed to enroll a device.
#[derive(Clone, Debug)]
pub struct NewDevice {
    pub user_id: Uuid,
    pub name: String,
    pub key: String,
    pub confirmed: bool,
}

impl NewDevice {
    /// A confirmed device with a freshly generated secret.
    #[must_use]
    pub fn generate(user_id: Uuid, name: &str) -> Self {
        Self {
            user_id,
            name: name.to_string(),
            key: Secret::generate_secret().to_encoded().to_string(),
            confirmed: true,
        }
    }

    #[must_use]
    pub fn into_device(self) -> TotpDevice {
        TotpDevice {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            name: self.name,
            confirmed: self.confirmed,
            key: self.key,
            step: DEFAULT_STEP,
            t0: 0,
            digits: DEFAULT_DIGITS,
            tolerance: DEFAULT_TOLERANCE,
            drift: 0,
            last_t: -1,
            throttling_failure_count: 0,
            throttling_failure_timestamp: None,
            created_at: Utc::now(),
        }
    }
}

impl TotpDevice {
    fn totp(&self, issuer: &str, account_name: &str) -> Result<TOTP> {
        let secret = Secret::Encoded(self.key.clone())
            .to_bytes()
            .map_err(|e| anyhow!("invalid device key: {e:?}"))?;
        let digits = usize::try_from(self.digits).map_err(|e| anyhow!("invalid digits: {e}"))?;
        let step = u64::try_from(self.step).map_err(|e| anyhow!("invalid step: {e}"))?;
        TOTP::new(
            Algorithm::SHA1,
            digits,
            0,
            step,
            secret,
            Some(issuer.to_string()),
            account_name.to_string(),
        )
        .map_err(|e| anyhow!("TOTP init error: {e}"))
    }

    /// Time step for `now`, before drift.
    #[must_use]
    pub fn time_step(&self, now: DateTime<Utc>) -> i64 {
        let step = i64::from(self.step.max(1));
        (now.timestamp() - self.t0).div_euclid(step)
    }

    fn step_start(&self, t: i64) -> Option<u64> {
        u64::try_from(self.t0 + t * i64::from(self.step)).ok()
    }

    /// Code for the step containing `now`, shifted by the current drift.
    ///
    /// # Errors
    /// Returns an error if the stored key or parameters are invalid.
    pub fn token_at(&self, now: DateTime<Utc>) -> Result<String> {
        let totp = self.totp("admin-otp", "device")?;
        let t = self.time_step(now) + i64::from(self.drift);
        let time = self
            .step_start(t)
            .ok_or_else(|| anyhow!("time step before epoch"))?;
        Ok(totp.generate(time))
    }

    /// Refuse verification while the failure back-off is running.
    ///
    /// # Errors
    /// Returns [`OtpError::Throttled`] while throttled.
    pub fn verify_is_allowed(&self, now: DateTime<Utc>, factor: u32) -> Result<(), OtpError> {
        let failures = u32::try_from(self.throttling_failure_count).unwrap_or(0);
        if failures == 0 || factor == 0 {
            return Ok(());
        }
        let Some(last_failure) = self.throttling_failure_timestamp else {
            return Ok(());
        };
        let exponent = (failures - 1).min(20);
        let delay = i64::from(factor) * (1_i64 << exponent);
        if now < last_failure + Duration::seconds(delay) {
            return Err(OtpError::Throttled { failures });
        }
        Ok(())
    }

    /// Check `token` inside the tolerance window. On a match `last_t` and
    /// `drift` move to the matching step.
    ///
    /// # Errors
    /// Returns an error if the stored key or parameters are invalid.
    pub fn match_token(&mut self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let token = token.trim();
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }
        let totp = self.totp("admin-otp", "device")?;
        let base = self.time_step(now);
        let tolerance = i64::from(self.tolerance.max(0));

        for offset in -tolerance..=tolerance {
            let t = base + i64::from(self.drift) + offset;
            if t <= self.last_t {
                continue;
            }
            let Some(time) = self.step_start(t) else {
                continue;
            };
            if totp.check(token, time) {
                self.last_t = t;
                self.drift = i16::try_from(i64::from(self.drift) + offset).unwrap_or(self.drift);
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub fn throttle_increment(&mut self, now: DateTime<Utc>) {
        self.throttling_failure_count = self.throttling_failure_count.saturating_add(1);
        self.throttling_failure_timestamp = Some(now);
    }

    pub fn throttle_reset(&mut self) {
        self.throttling_failure_count = 0;
        self.throttling_failure_timestamp = None;
    }

    /// `otpauth://` provisioning URL for authenticator apps.
    ///
    /// # Errors
    /// Returns an error if the stored key or parameters are invalid.
    pub fn config_url(&self, issuer: &str, account_name: &str) -> Result<String> {
        Ok(self.totp(issuer, account_name)?.get_url())
    }

    /// Provisioning QR code as PNG bytes.
    ///
    /// # Errors
    /// Returns an error if the stored key is invalid or the QR cannot be rendered.
    pub fn qr_png(&self, issuer: &str, account_name: &str) -> Result<Vec<u8>> {
        self.totp(issuer, account_name)?
            .get_qr_png()
            .map_err(|e| anyhow!("QR gen error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> TotpDevice {
        NewDevice::generate(Uuid::new_v4(), "phone").into_device()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    #[test]
    fn time_step_uses_t0_and_step() {
        let mut device = device();
        assert_eq!(device.time_step(at(59)), 1);
        assert_eq!(device.time_step(at(60)), 2);
        device.t0 = 30;
        assert_eq!(device.time_step(at(60)), 1);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn current_token_matches_once() {
        let mut device = device();
        let now = at(1_700_000_000);
        let token = device.token_at(now).unwrap();

        assert!(device.match_token(&token, now).unwrap());
        assert_eq!(device.last_t, device.time_step(now));
        // replay of the same code is refused
        assert!(!device.match_token(&token, now).unwrap());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn previous_step_is_tolerated_and_drift_follows() {
        let mut device = device();
        let now = at(1_700_000_000);
        let earlier = device.token_at(now - Duration::seconds(30)).unwrap();

        assert!(device.match_token(&earlier, now).unwrap());
        assert_eq!(device.drift, -1);
        assert_eq!(device.last_t, device.time_step(now) - 1);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn outside_window_is_rejected() {
        let mut device = device();
        let now = at(1_700_000_000);
        let stale = device.token_at(now - Duration::seconds(120)).unwrap();
        assert!(!device.match_token(&stale, now).unwrap());
        assert_eq!(device.last_t, -1);
        assert_eq!(device.drift, 0);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn non_numeric_tokens_never_match() {
        let mut device = device();
        assert!(!device.match_token("", at(1_700_000_000)).unwrap());
        assert!(!device.match_token("abcdef", at(1_700_000_000)).unwrap());
    }

    #[test]
    fn throttle_backs_off_exponentially() {
        let mut device = device();
        let start = at(1_700_000_000);
        assert!(device.verify_is_allowed(start, 1).is_ok());

        device.throttle_increment(start);
        assert!(device.verify_is_allowed(start, 1).is_err());
        assert!(device.verify_is_allowed(start + Duration::seconds(1), 1).is_ok());

        device.throttle_increment(start);
        device.throttle_increment(start);
        match device.verify_is_allowed(start + Duration::seconds(3), 1) {
            Err(OtpError::Throttled { failures }) => assert_eq!(failures, 3),
            other => panic!("expected throttled, got {other:?}"),
        }
        assert!(device.verify_is_allowed(start + Duration::seconds(4), 1).is_ok());

        device.throttle_reset();
        assert!(device.verify_is_allowed(start, 1).is_ok());
    }

    #[test]
    fn zero_factor_disables_throttling() {
        let mut device = device();
        let now = at(1_700_000_000);
        device.throttle_increment(now);
        assert!(device.verify_is_allowed(now, 0).is_ok());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn config_url_names_issuer_and_account() {
        let device = device();
        let url = device.config_url("Admin OTP", "root@example.com").unwrap();
        assert!(url.starts_with("otpauth://totp/"));
        assert!(url.contains("root%40example.com") || url.contains("root@example.com"));
    }
}
